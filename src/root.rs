use crate::{
	scheduler::{Runtime, Work},
	target::{NodeId, TargetTree},
	vnode::VNode,
	Error,
};
use std::rc::Rc;
use tracing::instrument;

/// Limits that turn runaway recursion and update loops into errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
	/// How deep realization and in-place updates may recurse.
	pub depth_limit: usize,
	/// How many rounds of updates causing further updates may run before the queue has to run dry.
	///
	/// A round flushes everything that was queued when it started, however many components that is.
	pub update_limit: usize,
}

impl Default for Options {
	fn default() -> Self {
		Self { depth_limit: 256, update_limit: 64 }
	}
}

/// Owns one mounted tree and the target it is rendered into.
///
/// Cloning a [`Root`] yields another handle to the same tree.
#[derive(Clone)]
pub struct Root(Rc<Runtime>);

impl Root {
	#[must_use]
	pub fn new(tree: impl TargetTree + 'static) -> Self {
		Self::with_options(tree, Options::default())
	}

	#[must_use]
	pub fn with_options(tree: impl TargetTree + 'static, options: Options) -> Self {
		Self(Runtime::new(Box::new(tree), options))
	}

	/// Mounts `vnode` as the only content managed in `container`.
	///
	/// # Errors
	///
	/// [`Error::AlreadyMounted`] if this root already has a tree, or whatever the initial render returns.
	#[instrument(skip(self, vnode))]
	pub fn render(&self, vnode: VNode, container: NodeId) -> Result<(), Error> {
		self.0.mount(vnode, container)
	}

	/// Unmounts the tree, running all teardown hooks.
	///
	/// # Errors
	///
	/// [`Error::NotMounted`] if there is no tree.
	#[instrument(skip(self))]
	pub fn unmount(&self) -> Result<(), Error> {
		if !self.0.is_mounted() {
			return Err(Error::NotMounted);
		}
		self.0.perform(Work::Unmount)
	}

	/// Re-renders the whole tree from the root [`VNode`] given to [`render`](`Root::render`).
	///
	/// # Errors
	///
	/// [`Error::NotMounted`] if there is no tree, or whatever the re-render returns.
	pub fn request_render(&self) -> Result<(), Error> {
		if !self.0.is_mounted() {
			return Err(Error::NotMounted);
		}
		self.0.perform(Work::Root)
	}

	/// Runs `f` with updates deferred, then flushes them all at once.
	///
	/// Nested calls (also from within event handlers) join the outermost batch.
	///
	/// # Errors
	///
	/// Whatever flushing the collected updates returns.
	pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R, Error> {
		self.0.batch(f)
	}

	/// Runs all passive effects ([`use_effect`](`crate::Hooks::use_effect`)) scheduled so far, then any updates they caused.
	///
	/// Call this once per frame or task after rendering, the way a browser would run a posted task.
	///
	/// # Errors
	///
	/// Whatever flushing the updates caused by effects returns.
	pub fn flush_effects(&self) -> Result<(), Error> {
		self.0.flush_passive_effects()
	}

	#[must_use]
	pub fn has_pending_effects(&self) -> bool {
		self.0.has_pending_effects()
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.0.is_mounted()
	}
}

/// Creates a [`Root`] for `tree` and mounts `vnode` into `container`.
///
/// # Errors
///
/// Whatever the initial render returns.
pub fn render(tree: impl TargetTree + 'static, vnode: VNode, container: NodeId) -> Result<Root, Error> {
	let root = Root::new(tree);
	root.render(vnode, container)?;
	Ok(root)
}
