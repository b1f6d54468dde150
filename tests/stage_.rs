#![allow(dead_code)]

use reconcile_dom::{memory::MemoryTree, Error, FunctionComponent, NodeId, Root, VNode};
use std::{cell::RefCell, rc::Rc};

/// A mounted [`Root`] whose content can be swapped out between renders.
pub struct Stage {
	pub tree: MemoryTree,
	pub container: NodeId,
	pub root: Root,
	content: Rc<RefCell<VNode>>,
}

impl Stage {
	pub fn new(initial: VNode) -> Self {
		Self::try_new(initial).unwrap()
	}

	pub fn try_new(initial: VNode) -> Result<Self, Error> {
		let tree = MemoryTree::new();
		let container = tree.create_root();
		Self::mount(tree, container, initial)
	}

	/// For components that need to look at the tree they are rendered into.
	pub fn mount(tree: MemoryTree, container: NodeId, initial: VNode) -> Result<Self, Error> {
		let root = Root::new(tree.clone());
		let content = Rc::new(RefCell::new(initial));

		let view = FunctionComponent::new("View", {
			let content = Rc::clone(&content);
			move |_, _| Ok(content.borrow().clone())
		});
		root.render(VNode::function(&view), container)?;

		Ok(Self { tree, container, root, content })
	}

	/// Replaces the content and re-renders it.
	pub fn show(&self, next: VNode) -> Result<(), Error> {
		*self.content.borrow_mut() = next;
		self.root.request_render()
	}

	pub fn html(&self) -> String {
		self.tree.inner_html(self.container)
	}

	/// The first child of the container.
	pub fn top(&self) -> NodeId {
		self.tree.children(self.container)[0]
	}
}

pub fn list(keys: &[&'static str]) -> VNode {
	VNode::element("ul").children(keys.iter().map(|key| VNode::element("li").key(*key).child(*key)))
}
