//! Pending transaction queue.
//!
//! First in, first out, except that a failed head may be moved to the tail
//! to let the rest of the queue make progress. The queue does no locking of
//! its own; the relay wraps it in an async mutex.

use std::collections::VecDeque;
use txrelay_types::Transaction;

#[derive(Debug, Default)]
pub struct TxQueue {
	items: VecDeque<Transaction>,
}

impl TxQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a transaction at the tail.
	pub fn enqueue(&mut self, tx: Transaction) {
		self.items.push_back(tx);
	}

	pub fn peek_head(&self) -> Option<&Transaction> {
		self.items.front()
	}

	pub fn remove_head(&mut self) -> Option<Transaction> {
		self.items.pop_front()
	}

	/// Moves the transaction with `id` to the tail.
	///
	/// The relative order of every other transaction is unchanged. Returns
	/// false if no such transaction is queued.
	pub fn move_to_tail(&mut self, id: &str) -> bool {
		let Some(position) = self.items.iter().position(|tx| tx.id == id) else {
			return false;
		};
		match self.items.remove(position) {
			Some(tx) => {
				self.items.push_back(tx);
				true
			},
			None => false,
		}
	}

	pub fn get_mut(&mut self, id: &str) -> Option<&mut Transaction> {
		self.items.iter_mut().find(|tx| tx.id == id)
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Snapshot of the queue in order. The queue itself is left untouched.
	pub fn drain(&self) -> Vec<Transaction> {
		self.items.iter().cloned().collect()
	}

	pub fn clear(&mut self) {
		self.items.clear();
	}
}
