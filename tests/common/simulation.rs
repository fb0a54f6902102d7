//! In-memory server and clients for end-to-end convergence tests
//!
//! The server keeps, for every client, the operations it has sent that
//! client and that the client had not yet seen when it last submitted.
//! A submission made at version `v` is transformed against the entries at
//! `v` or later, and those entries are rewritten so they stay in the
//! client's context.

use crate::common::fixtures::remote_event;
use std::collections::VecDeque;
use xfcollab::ot::{ClientConcurrencyControl, DataValue, DiscreteOperation, Operation, OperationTransformer};
use xfcollab::shared::UnprocessedOperationEvent;

/// Message from the server to one client
#[derive(Debug, Clone)]
pub enum Delivery {
    Ack { seq_no: u64, version: u64 },
    Remote(UnprocessedOperationEvent),
}

/// Sequences submissions into one history
#[derive(Debug)]
pub struct SimServer {
    pub doc: DataValue,
    pub version: u64,
    unseen: Vec<Vec<(u64, Operation)>>,
}

impl SimServer {
    pub fn new(doc: &DataValue, clients: usize) -> Self {
        Self {
            doc: doc.clone(),
            version: 0,
            unseen: vec![Vec::new(); clients],
        }
    }

    /// Sequence the oldest submission of `clients[from]`; false if it had none
    pub fn sequence(&mut self, clients: &mut [SimClient], from: usize) -> bool {
        let Some(event) = clients[from].outbox.pop_front() else {
            return false;
        };
        let (version, operation) = self.submit(from, &event);

        for (index, client) in clients.iter_mut().enumerate() {
            let delivery = if index == from {
                Delivery::Ack {
                    seq_no: event.seq_no,
                    version,
                }
            } else {
                Delivery::Remote(remote_event(&event.client_id, event.seq_no, version, operation.clone()))
            };
            client.inbox.push_back(delivery);
        }
        true
    }

    /// Apply `event` from client `from`, returning its version and final form
    pub fn submit(&mut self, from: usize, event: &UnprocessedOperationEvent) -> (u64, Operation) {
        let transformer = OperationTransformer::new();
        let unseen = &mut self.unseen[from];
        unseen.retain(|(version, _)| *version >= event.context_version);

        let mut operation = event.operation.clone();
        for (_, entry) in unseen.iter_mut() {
            let pair = transformer.transform(entry, &operation).unwrap();
            *entry = pair.server_op;
            operation = pair.client_op;
        }

        if let Err(err) = self.doc.apply(&operation) {
            panic!("Server failed to apply {:?} to {:?}: {}", operation, self.doc, err);
        }
        let version = self.version;
        self.version += 1;
        for (index, unseen) in self.unseen.iter_mut().enumerate() {
            if index != from {
                unseen.push((version, operation.clone()));
            }
        }
        (version, operation)
    }
}

/// A client with its own copy of the data
pub struct SimClient {
    pub ccc: ClientConcurrencyControl,
    pub doc: DataValue,
    pub outbox: VecDeque<UnprocessedOperationEvent>,
    pub inbox: VecDeque<Delivery>,
}

impl SimClient {
    pub fn new(id: &str, doc: &DataValue) -> Self {
        Self {
            ccc: ClientConcurrencyControl::new(id, 0),
            doc: doc.clone(),
            outbox: VecDeque::new(),
            inbox: VecDeque::new(),
        }
    }

    /// Apply a local edit and queue it for the server
    pub fn edit(&mut self, op: DiscreteOperation) {
        let op = Operation::from(op);
        if let Err(err) = self.doc.apply(&op) {
            panic!("Client failed to apply {:?} to {:?}: {}", op, self.doc, err);
        }
        if let Some(event) = self.ccc.process_outgoing_operation(op).unwrap() {
            self.outbox.push_back(event);
        }
    }

    pub fn start_batch(&mut self) {
        if !self.ccc.is_batch_operation_in_progress() {
            self.ccc.start_batch_operation().unwrap();
        }
    }

    /// Send the open batch, or drop it if nothing was added
    pub fn complete_batch(&mut self) {
        if !self.ccc.is_batch_operation_in_progress() {
            return;
        }
        if self.ccc.batch_size() == 0 {
            self.ccc.cancel_batch_operation().unwrap();
        } else {
            let event = self.ccc.complete_batch_operation().unwrap();
            self.outbox.push_back(event);
        }
    }

    /// Process the next server message without applying remote edits
    pub fn receive(&mut self) -> bool {
        match self.inbox.pop_front() {
            Some(Delivery::Ack { seq_no, version }) => {
                self.ccc.process_acknowledgement_operation(seq_no, version).unwrap();
                true
            }
            Some(Delivery::Remote(event)) => {
                self.ccc.process_remote_operation(event).unwrap();
                true
            }
            None => false,
        }
    }

    /// Apply every remote edit the controller has released
    pub fn apply_incoming(&mut self) {
        while let Some(incoming) = self.ccc.get_next_incoming_operation() {
            if let Err(err) = self.doc.apply(&incoming.operation) {
                panic!("Client failed to apply remote {:?} to {:?}: {}", incoming.operation, self.doc, err);
            }
        }
    }

    pub fn drain(&mut self) {
        while self.receive() {}
        self.apply_incoming();
    }
}

/// Finish every batch and exchange messages until nothing is left in transit
pub fn settle(server: &mut SimServer, clients: &mut [SimClient]) {
    for client in clients.iter_mut() {
        client.complete_batch();
    }
    loop {
        let mut moved = false;
        for from in 0..clients.len() {
            while server.sequence(clients, from) {
                moved = true;
            }
        }
        for client in clients.iter_mut() {
            moved |= !client.inbox.is_empty();
            client.drain();
        }
        if !moved {
            break;
        }
    }
}
