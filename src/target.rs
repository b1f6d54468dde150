//! The mutation primitives the reconciler drives.
//!
//! Realized nodes are referred to by [`NodeId`] handles that the adapter hands out, so the engine itself never touches a concrete node type.

use core::any::Any;
use std::rc::Rc;

/// Opaque handle of a realized node, allocated by a [`TargetTree`].
pub type NodeId = usize;

/// An event handler as stored in [`Value::Handler`](`crate::Value::Handler`).
///
/// The payload is adapter-specific: [`WebTree`](`crate::web::WebTree`) passes a [`web_sys::Event`],
/// [`MemoryTree`](`crate::memory::MemoryTree`) whatever was handed to [`dispatch_event`](`crate::memory::MemoryTree::dispatch_event`).
pub type EventHandler = Rc<dyn Fn(&dyn Any)>;

/// A live, mutable tree (usually a DOM) that a [`Root`](`crate::Root`) keeps in sync with its virtual nodes.
///
/// Fragment containers follow [***DocumentFragment***](https://developer.mozilla.org/en-US/docs/Web/API/DocumentFragment) semantics:
/// inserting one moves its children into the target parent and leaves the container empty.
///
/// Inserting a node that is already attached elsewhere moves it.
pub trait TargetTree {
	fn create_element(&mut self, tag: &str) -> NodeId;
	fn create_text(&mut self, text: &str) -> NodeId;
	fn create_fragment(&mut self) -> NodeId;

	fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
	fn set_style(&mut self, node: NodeId, name: &str, value: &str);
	/// Replaces the handler for `event` on `node`, if any.
	fn set_event_handler(&mut self, node: NodeId, event: &str, handler: EventHandler);
	/// Drops all handlers registered on `node`.
	fn clear_event_handlers(&mut self, node: NodeId);
	fn set_text(&mut self, node: NodeId, text: &str);

	/// Inserts `node` into `parent` before `reference`, or appends it if `reference` is [`None`].
	fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);
	fn append_child(&mut self, parent: NodeId, node: NodeId);
	fn remove_child(&mut self, parent: NodeId, node: NodeId);

	fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

	/// Called once a removed node will not be referenced by the reconciler again.
	fn release(&mut self, _node: NodeId) {}
}
