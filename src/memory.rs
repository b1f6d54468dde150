//! A [`TargetTree`] that keeps its nodes in memory and records every mutation.
//!
//! Useful wherever there is no DOM, and for asserting the exact mutations an update caused.

use crate::target::{EventHandler, NodeId, TargetTree};
use core::{any::Any, cell::RefCell, fmt::Write as _, mem};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{error, trace, warn};

/// One call the reconciler made into a [`MemoryTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	CreateElement { node: NodeId, tag: String },
	CreateText { node: NodeId, text: String },
	CreateFragment { node: NodeId },
	SetAttribute { node: NodeId, name: String, value: String },
	SetStyle { node: NodeId, name: String, value: String },
	SetEventHandler { node: NodeId, event: String },
	ClearEventHandlers { node: NodeId },
	SetText { node: NodeId, text: String },
	InsertBefore { parent: NodeId, node: NodeId, reference: NodeId },
	AppendChild { parent: NodeId, node: NodeId },
	RemoveChild { parent: NodeId, node: NodeId },
}

impl Mutation {
	/// Whether this mutation changes where nodes are attached.
	#[must_use]
	pub fn is_structural(&self) -> bool {
		matches!(self, Mutation::InsertBefore { .. } | Mutation::AppendChild { .. } | Mutation::RemoveChild { .. })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
	Element(String),
	Text(String),
	Fragment,
}

struct MemoryNode {
	kind: NodeKind,
	attributes: IndexMap<String, String>,
	style: IndexMap<String, String>,
	handlers: IndexMap<String, EventHandler>,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	released: bool,
}

impl MemoryNode {
	fn new(kind: NodeKind) -> Self {
		Self {
			kind,
			attributes: IndexMap::new(),
			style: IndexMap::new(),
			handlers: IndexMap::new(),
			parent: None,
			children: Vec::new(),
			released: false,
		}
	}
}

#[derive(Default)]
struct Arena {
	nodes: Vec<MemoryNode>,
	journal: Vec<Mutation>,
}

impl Arena {
	fn push(&mut self, node: MemoryNode) -> NodeId {
		self.nodes.push(node);
		self.nodes.len() - 1
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.nodes[node].parent.take() {
			self.nodes[parent].children.retain(|child| *child != node);
		}
	}

	/// Moves `node` (or, for a fragment, its children) into `parent` before `reference`.
	fn insert(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
		let moved = if self.nodes[node].kind == NodeKind::Fragment {
			let children = mem::take(&mut self.nodes[node].children);
			for child in &children {
				self.nodes[*child].parent = None;
			}
			children
		} else {
			self.detach(node);
			vec![node]
		};

		let mut index = match reference {
			Some(reference) => match self.nodes[parent].children.iter().position(|child| *child == reference) {
				Some(index) => index,
				None => {
					error!("Reference node {} is not a child of {}; appending instead.", reference, parent);
					self.nodes[parent].children.len()
				}
			},
			None => self.nodes[parent].children.len(),
		};
		for child in moved {
			self.nodes[child].parent = Some(parent);
			self.nodes[parent].children.insert(index, child);
			index += 1;
		}
	}

	fn write_html(&self, node: NodeId, html: &mut String) {
		let node = &self.nodes[node];
		match &node.kind {
			NodeKind::Text(text) => html.push_str(text),
			NodeKind::Fragment => node.children.iter().for_each(|child| self.write_html(*child, html)),
			NodeKind::Element(tag) => {
				html.push('<');
				html.push_str(tag);
				for (name, value) in &node.attributes {
					let _ = write!(html, " {}=\"{}\"", name, value);
				}
				if !node.style.is_empty() {
					html.push_str(" style=\"");
					for (name, value) in &node.style {
						let _ = write!(html, "{}: {};", name, value);
					}
					html.push('"');
				}
				html.push('>');
				node.children.iter().for_each(|child| self.write_html(*child, html));
				let _ = write!(html, "</{}>", tag);
			}
		}
	}
}

/// An in-memory tree. Clones share the same nodes, so a test can keep one handle while a [`Root`](`crate::Root`) owns another.
#[derive(Clone, Default)]
pub struct MemoryTree(Rc<RefCell<Arena>>);

impl MemoryTree {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a detached element to mount into. Not journaled.
	#[must_use]
	pub fn create_root(&self) -> NodeId {
		self.0.borrow_mut().push(MemoryNode::new(NodeKind::Element("#root".to_owned())))
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> Vec<NodeId> {
		self.0.borrow().nodes[node].children.clone()
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.0.borrow().nodes[node].parent
	}

	/// The tag name, if `node` is an element.
	#[must_use]
	pub fn tag(&self, node: NodeId) -> Option<String> {
		match &self.0.borrow().nodes[node].kind {
			NodeKind::Element(tag) => Some(tag.clone()),
			_ => None,
		}
	}

	/// The content, if `node` is a text node.
	#[must_use]
	pub fn text(&self, node: NodeId) -> Option<String> {
		match &self.0.borrow().nodes[node].kind {
			NodeKind::Text(text) => Some(text.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		self.0.borrow().nodes[node].attributes.get(name).cloned()
	}

	#[must_use]
	pub fn style(&self, node: NodeId, name: &str) -> Option<String> {
		self.0.borrow().nodes[node].style.get(name).cloned()
	}

	#[must_use]
	pub fn has_handler(&self, node: NodeId, event: &str) -> bool {
		self.0.borrow().nodes[node].handlers.contains_key(event)
	}

	/// Whether `node` is `ancestor` or (transitively) one of its children.
	#[must_use]
	pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
		let arena = self.0.borrow();
		let mut current = Some(node);
		while let Some(node) = current {
			if node == ancestor {
				return true;
			}
			current = arena.nodes[node].parent;
		}
		false
	}

	/// Serializes the children of `node` as HTML, without escaping.
	#[must_use]
	pub fn inner_html(&self, node: NodeId) -> String {
		let arena = self.0.borrow();
		let mut html = String::new();
		for child in &arena.nodes[node].children {
			arena.write_html(*child, &mut html);
		}
		html
	}

	#[must_use]
	pub fn journal(&self) -> Vec<Mutation> {
		self.0.borrow().journal.clone()
	}

	/// Returns and clears the journal.
	#[must_use]
	pub fn take_journal(&self) -> Vec<Mutation> {
		mem::take(&mut self.0.borrow_mut().journal)
	}

	/// Whether the reconciler is done with `node`, via [`TargetTree::release`].
	#[must_use]
	pub fn is_released(&self, node: NodeId) -> bool {
		self.0.borrow().nodes[node].released
	}

	/// Calls the handler registered for `event` on `node` with `payload`. Returns whether there was one.
	///
	/// There is no propagation.
	pub fn dispatch_event(&self, node: NodeId, event: &str, payload: &dyn Any) -> bool {
		let handler = self.0.borrow().nodes[node].handlers.get(event).cloned();
		match handler {
			Some(handler) => {
				trace!(node, event, "Dispatching event");
				handler(payload);
				true
			}
			None => {
				warn!("No {} handler on node {}.", event, node);
				false
			}
		}
	}

	fn record(&self, mutation: Mutation) {
		self.0.borrow_mut().journal.push(mutation);
	}
}

impl TargetTree for MemoryTree {
	fn create_element(&mut self, tag: &str) -> NodeId {
		let node = self.0.borrow_mut().push(MemoryNode::new(NodeKind::Element(tag.to_owned())));
		self.record(Mutation::CreateElement { node, tag: tag.to_owned() });
		node
	}

	fn create_text(&mut self, text: &str) -> NodeId {
		let node = self.0.borrow_mut().push(MemoryNode::new(NodeKind::Text(text.to_owned())));
		self.record(Mutation::CreateText { node, text: text.to_owned() });
		node
	}

	fn create_fragment(&mut self) -> NodeId {
		let node = self.0.borrow_mut().push(MemoryNode::new(NodeKind::Fragment));
		self.record(Mutation::CreateFragment { node });
		node
	}

	fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
		self.0.borrow_mut().nodes[node].attributes.insert(name.to_owned(), value.to_owned());
		self.record(Mutation::SetAttribute { node, name: name.to_owned(), value: value.to_owned() });
	}

	fn set_style(&mut self, node: NodeId, name: &str, value: &str) {
		self.0.borrow_mut().nodes[node].style.insert(name.to_owned(), value.to_owned());
		self.record(Mutation::SetStyle { node, name: name.to_owned(), value: value.to_owned() });
	}

	fn set_event_handler(&mut self, node: NodeId, event: &str, handler: EventHandler) {
		self.0.borrow_mut().nodes[node].handlers.insert(event.to_owned(), handler);
		self.record(Mutation::SetEventHandler { node, event: event.to_owned() });
	}

	fn clear_event_handlers(&mut self, node: NodeId) {
		self.0.borrow_mut().nodes[node].handlers.clear();
		self.record(Mutation::ClearEventHandlers { node });
	}

	fn set_text(&mut self, node: NodeId, text: &str) {
		match &mut self.0.borrow_mut().nodes[node].kind {
			NodeKind::Text(content) => text.clone_into(content),
			kind => error!("Expected a text node but found {:?}; not updating.", kind),
		}
		self.record(Mutation::SetText { node, text: text.to_owned() });
	}

	fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
		match reference {
			Some(reference) => {
				self.0.borrow_mut().insert(parent, node, Some(reference));
				self.record(Mutation::InsertBefore { parent, node, reference });
			}
			None => self.append_child(parent, node),
		}
	}

	fn append_child(&mut self, parent: NodeId, node: NodeId) {
		self.0.borrow_mut().insert(parent, node, None);
		self.record(Mutation::AppendChild { parent, node });
	}

	fn remove_child(&mut self, parent: NodeId, node: NodeId) {
		{
			let mut arena = self.0.borrow_mut();
			if arena.nodes[node].parent == Some(parent) {
				arena.detach(node);
			} else {
				error!("Node {} is not a child of {}; not removing.", node, parent);
			}
		}
		self.record(Mutation::RemoveChild { parent, node });
	}

	fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let arena = self.0.borrow();
		let parent = arena.nodes[node].parent?;
		let siblings = &arena.nodes[parent].children;
		let index = siblings.iter().position(|child| *child == node)?;
		siblings.get(index + 1).copied()
	}

	fn release(&mut self, node: NodeId) {
		let mut arena = self.0.borrow_mut();
		let node = &mut arena.nodes[node];
		if node.parent.is_some() || !node.children.is_empty() {
			warn!("Released node is still linked into the tree.");
		}
		node.released = true;
	}
}
