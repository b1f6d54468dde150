//! The update queue: decides whether a state change is flushed right away or joins the current batch,
//! and drains everything that was deferred.

use crate::{
	component::ClassInstance,
	hooks::EffectKind,
	reconcile::{Fiber, Pass},
	root::Options,
	target::{NodeId, TargetTree},
	vnode::{Props, State, VNode},
	Error,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	mem,
};
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{error, trace, trace_span, warn};

/// One pending change of a class component's state.
pub enum StateDelta {
	/// Merged into the state key by key.
	Partial(State),
	/// Called with the state as folded so far; the result is merged like [`StateDelta::Partial`].
	Update(Box<dyn FnOnce(&State) -> State>),
}

impl Debug for StateDelta {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			StateDelta::Partial(partial) => f.debug_tuple("Partial").field(partial).finish(),
			StateDelta::Update(_) => f.write_str("Update(..)"),
		}
	}
}

/// Folds `deltas` left to right into `state`.
pub(crate) fn fold_deltas(mut state: State, deltas: Vec<StateDelta>) -> State {
	for delta in deltas {
		let partial = match delta {
			StateDelta::Partial(partial) => partial,
			StateDelta::Update(update) => update(&state),
		};
		for (name, value) in partial {
			state.insert(name, value);
		}
	}
	state
}

/// The handle through which a class component (or anyone holding it) changes that component's state.
///
/// Obtained from [`Scope::updater`](`crate::Scope::updater`) or a [`NodeRef`](`crate::NodeRef`) pointing at the instance.
#[derive(Clone)]
pub struct Updater(Rc<UpdaterState>);

struct UpdaterState {
	instance: Weak<ClassInstance>,
	runtime: Weak<Runtime>,
	deltas: RefCell<Vec<StateDelta>>,
	props: RefCell<Option<Props>>,
}

impl Updater {
	pub(crate) fn new(instance: Weak<ClassInstance>, runtime: Weak<Runtime>) -> Self {
		Self(Rc::new(UpdaterState {
			instance,
			runtime,
			deltas: RefCell::default(),
			props: RefCell::default(),
		}))
	}

	/// Queues `partial` to be merged into the state.
	///
	/// # Errors
	///
	/// If the update is flushed synchronously, errors from the resulting re-render are returned here.
	pub fn set_state(&self, partial: State) -> Result<(), Error> {
		self.add_delta(StateDelta::Partial(partial))
	}

	/// Queues a state transition computed from the state as folded up to this point.
	///
	/// # Errors
	///
	/// See [`set_state`](`Updater::set_state`).
	pub fn update_state(&self, update: impl FnOnce(&State) -> State + 'static) -> Result<(), Error> {
		self.add_delta(StateDelta::Update(Box::new(update)))
	}

	/// # Errors
	///
	/// See [`set_state`](`Updater::set_state`).
	pub fn add_delta(&self, delta: StateDelta) -> Result<(), Error> {
		self.0.deltas.borrow_mut().push(delta);
		self.emit()
	}

	/// The instance's current (committed) state, or [`None`] if it has been dropped.
	#[must_use]
	pub fn state(&self) -> Option<State> {
		self.instance().map(|instance| instance.state())
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn emit(&self) -> Result<(), Error> {
		match self.0.runtime.upgrade() {
			Some(runtime) => runtime.perform(Work::Class(self.clone())),
			None => {
				trace!("Dropping state update: the root is gone.");
				Ok(())
			}
		}
	}

	pub(crate) fn set_pending_props(&self, props: Props) {
		*self.0.props.borrow_mut() = Some(props);
	}

	pub(crate) fn take_pending(&self) -> (Option<Props>, Vec<StateDelta>) {
		(self.0.props.borrow_mut().take(), mem::take(&mut *self.0.deltas.borrow_mut()))
	}

	pub(crate) fn instance(&self) -> Option<Rc<ClassInstance>> {
		self.0.instance.upgrade()
	}
}

impl Debug for Updater {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Updater")
			.field("pending_deltas", &self.0.deltas.borrow().len())
			.field("pending_props", &self.0.props.borrow().is_some())
			.finish()
	}
}

pub(crate) enum Work {
	Class(Updater),
	Root,
	Unmount,
}

/// Pending work. Updaters are de-duplicated; root re-renders and unmounts collapse into flags.
#[derive(Default)]
struct UpdateQueue {
	batching: bool,
	pending: VecDeque<Updater>,
	root: bool,
	unmount: bool,
}

impl UpdateQueue {
	fn enqueue(&mut self, work: Work) {
		match work {
			Work::Class(updater) => {
				if !self.pending.iter().any(|pending| pending.ptr_eq(&updater)) {
					self.pending.push_back(updater);
				}
			}
			Work::Root => self.root = true,
			Work::Unmount => self.unmount = true,
		}
	}

	fn next(&mut self) -> Option<Work> {
		if let Some(updater) = self.pending.pop_front() {
			Some(Work::Class(updater))
		} else if mem::take(&mut self.root) {
			Some(Work::Root)
		} else if mem::take(&mut self.unmount) {
			Some(Work::Unmount)
		} else {
			None
		}
	}

	fn len(&self) -> usize {
		self.pending.len() + usize::from(self.root) + usize::from(self.unmount)
	}

	fn clear(&mut self) {
		self.pending.clear();
		self.root = false;
		self.unmount = false;
	}
}

pub(crate) type EffectJob = Box<dyn FnOnce()>;

pub(crate) struct MountPoint {
	pub(crate) container: NodeId,
	pub(crate) vnode: VNode,
	pub(crate) fiber: Option<Fiber>,
}

/// Everything a [`Root`](`crate::Root`) owns. Kept behind an [`Rc`] so that updaters and hook handles can reach it weakly.
pub(crate) struct Runtime {
	pub(crate) options: Options,
	tree: RefCell<Box<dyn TargetTree>>,
	queue: RefCell<UpdateQueue>,
	busy: Cell<bool>,
	root: RefCell<Option<MountPoint>>,
	layout_effects: RefCell<Vec<EffectJob>>,
	passive_effects: RefCell<Vec<EffectJob>>,
}

/// Clears the busy flag however the work loop is left.
struct BusyGuard<'a>(&'a Cell<bool>);
impl<'a> BusyGuard<'a> {
	fn enter(busy: &'a Cell<bool>) -> Self {
		busy.set(true);
		Self(busy)
	}
}
impl Drop for BusyGuard<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

/// Closes the batch however `f` is left.
struct BatchGuard<'a>(&'a RefCell<UpdateQueue>);
impl<'a> BatchGuard<'a> {
	fn open(queue: &'a RefCell<UpdateQueue>) -> Self {
		queue.borrow_mut().batching = true;
		Self(queue)
	}
}
impl Drop for BatchGuard<'_> {
	fn drop(&mut self) {
		self.0.borrow_mut().batching = false;
	}
}

impl Runtime {
	pub(crate) fn new(tree: Box<dyn TargetTree>, options: Options) -> Rc<Self> {
		Rc::new(Self {
			options,
			tree: RefCell::new(tree),
			queue: RefCell::default(),
			busy: Cell::new(false),
			root: RefCell::default(),
			layout_effects: RefCell::default(),
			passive_effects: RefCell::default(),
		})
	}

	/// Runs `work` now, or queues it if a batch is open or the engine is already working.
	pub(crate) fn perform(self: &Rc<Self>, work: Work) -> Result<(), Error> {
		if self.busy.get() || self.queue.borrow().batching {
			trace!("Deferring update.");
			self.queue.borrow_mut().enqueue(work);
			return Ok(());
		}
		let _busy = BusyGuard::enter(&self.busy);
		self.work_loop(Some(work))
	}

	/// Opens a batch around `f`. Nested batches join the outermost one.
	pub(crate) fn batch<R>(self: &Rc<Self>, f: impl FnOnce() -> R) -> Result<R, Error> {
		if self.busy.get() || self.queue.borrow().batching {
			return Ok(f());
		}

		let result = {
			let _batching = BatchGuard::open(&self.queue);
			f()
		};

		let _busy = BusyGuard::enter(&self.busy);
		self.work_loop(None)?;
		Ok(result)
	}

	/// Drains the queue in rounds: each round flushes what was queued when it started,
	/// so only chains of updates causing further updates count against [`Options::update_limit`].
	fn work_loop(self: &Rc<Self>, first: Option<Work>) -> Result<(), Error> {
		let span = trace_span!("Flushing updates");
		let _enter = span.enter();

		if let Some(work) = first {
			self.queue.borrow_mut().enqueue(work);
		}

		let (mut rounds, mut remaining, mut flushes) = (0, 0, 0);
		loop {
			if remaining == 0 {
				let queued = self.queue.borrow().len();
				if queued > 0 {
					rounds += 1;
					if rounds > self.options.update_limit {
						error!("Update limit reached; discarding pending updates.");
						self.queue.borrow_mut().clear();
						return Err(Error::UpdateLimitExceeded { limit: self.options.update_limit });
					}
					trace!(round = rounds, queued, "Starting round");
					remaining = queued;
				}
			}

			let work = self.queue.borrow_mut().next();
			match work {
				Some(work) => {
					remaining = remaining.saturating_sub(1);
					flushes += 1;
					self.run_pass(|pass| pass.perform(work))?;
				}
				None => {
					let jobs = mem::take(&mut *self.layout_effects.borrow_mut());
					if jobs.is_empty() {
						trace!("Flushed {} update(s) in {} round(s).", flushes, rounds);
						return Ok(());
					}
					trace!("Running {} layout effect(s).", jobs.len());
					for job in jobs {
						job();
					}
				}
			}
		}
	}

	fn run_pass<R>(self: &Rc<Self>, f: impl FnOnce(&mut Pass<'_>) -> Result<R, Error>) -> Result<R, Error> {
		let mut tree = self.tree.borrow_mut();
		let mut pass = Pass::new(self, &mut **tree);
		f(&mut pass)
	}

	pub(crate) fn mount(self: &Rc<Self>, vnode: VNode, container: NodeId) -> Result<(), Error> {
		{
			let mut root = self.root.borrow_mut();
			if root.is_some() {
				return Err(Error::AlreadyMounted);
			}
			*root = Some(MountPoint { container, vnode, fiber: None });
		}
		self.perform(Work::Root)
	}

	pub(crate) fn is_mounted(&self) -> bool {
		self.root.borrow().is_some()
	}

	/// Takes the root fiber out for a pass. [`None`] if nothing is mounted.
	pub(crate) fn take_root(&self) -> Option<(NodeId, VNode, Option<Fiber>)> {
		self.root.borrow_mut().as_mut().map(|root| (root.container, root.vnode.clone(), root.fiber.take()))
	}

	pub(crate) fn restore_root(&self, fiber: Fiber) {
		match self.root.borrow_mut().as_mut() {
			Some(root) => root.fiber = Some(fiber),
			None => warn!("Root was unmounted while it was being rendered."),
		}
	}

	pub(crate) fn remove_root(&self) -> Option<MountPoint> {
		self.root.borrow_mut().take()
	}

	pub(crate) fn schedule_effect(&self, kind: EffectKind, job: EffectJob) {
		match kind {
			EffectKind::Layout => self.layout_effects.borrow_mut().push(job),
			EffectKind::Passive => self.passive_effects.borrow_mut().push(job),
		}
	}

	pub(crate) fn has_pending_effects(&self) -> bool {
		!self.passive_effects.borrow().is_empty()
	}

	/// Runs all scheduled passive effects as one task, then flushes whatever updates they caused.
	pub(crate) fn flush_passive_effects(self: &Rc<Self>) -> Result<(), Error> {
		if self.busy.get() {
			trace!("Not flushing effects from inside an update.");
			return Ok(());
		}

		let _busy = BusyGuard::enter(&self.busy);
		loop {
			let jobs = mem::take(&mut *self.passive_effects.borrow_mut());
			if jobs.is_empty() {
				return Ok(());
			}
			trace!("Running {} effect(s).", jobs.len());
			for job in jobs {
				job();
			}
			self.work_loop(None)?;
		}
	}
}
