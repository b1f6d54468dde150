use reconcile_dom::{
	map, memory::MemoryTree, Component, ComponentClass, Error, NodeId, NodeRef, Options, Props, RefValue, Root, Scope, State, Updater, VNode, Value,
};
use std::{cell::RefCell, rc::Rc};

mod stage_;
use stage_::Stage;

type Log = Rc<RefCell<Vec<String>>>;

fn take(log: &Log) -> Vec<String> {
	log.borrow_mut().drain(..).collect()
}

fn label(props: &Props) -> String {
	props.get("label").and_then(Value::as_str).unwrap_or_default().to_owned()
}

fn updater(node_ref: &NodeRef) -> Updater {
	match node_ref.get() {
		Some(RefValue::Instance(updater)) => updater,
		other => panic!("Expected a class instance, found {:?}", other),
	}
}

/// Logs every lifecycle method, along with what the tree looks like at that point.
struct Probe {
	log: Log,
	tree: MemoryTree,
	container: NodeId,
	node: NodeRef,
}

impl Probe {
	fn push(&self, entry: impl Into<String>) {
		self.log.borrow_mut().push(entry.into());
	}

	fn shown(&self) -> String {
		self.node
			.node()
			.and_then(|node| self.tree.children(node).first().and_then(|text| self.tree.text(*text)))
			.unwrap_or_default()
	}
}

impl Component for Probe {
	fn render(&self, scope: &Scope<'_>) -> Result<VNode, Error> {
		self.push(format!("render {}", label(scope.props())));
		Ok(VNode::element("p").with_ref(&self.node).child(label(scope.props())))
	}

	fn will_mount(&mut self, _: &Scope<'_>) {
		self.push("will_mount");
	}

	fn did_mount(&mut self, _: &Scope<'_>) -> Result<(), Error> {
		let attached = self.node.node().map_or(false, |node| self.tree.is_within(node, self.container));
		self.push(format!("did_mount attached={}", attached));
		Ok(())
	}

	fn will_receive_props(&mut self, _: &Scope<'_>, next_props: &Props) {
		self.push(format!("will_receive_props {}", label(next_props)));
	}

	fn should_update(&self, _: &Scope<'_>, _: &Props, _: &State) -> bool {
		self.push("should_update");
		true
	}

	fn will_update(&mut self, _: &Scope<'_>, _: &Props, _: &State) {
		self.push("will_update");
	}

	fn snapshot_before_update(&self, _: &Scope<'_>, prev_props: &Props, _: &State) -> Option<Value> {
		self.push(format!("snapshot shown={}", self.shown()));
		Some(label(prev_props).into())
	}

	fn did_update(&mut self, scope: &Scope<'_>, prev_props: &Props, _: &State, snapshot: Option<Value>) -> Result<(), Error> {
		self.push(format!(
			"did_update {} -> {} snapshot={} shown={}",
			label(prev_props),
			label(scope.props()),
			snapshot.as_ref().and_then(Value::as_str).unwrap_or("none"),
			self.shown(),
		));
		Ok(())
	}

	fn will_unmount(&mut self, _: &Scope<'_>) {
		self.push("will_unmount");
	}
}

fn probe(log: &Log, tree: &MemoryTree, container: NodeId, node: &NodeRef) -> ComponentClass {
	let (log, tree, node) = (Rc::clone(log), tree.clone(), node.clone());
	ComponentClass::new("Probe", move |_| {
		(
			Probe {
				log: Rc::clone(&log),
				tree: tree.clone(),
				container,
				node: node.clone(),
			},
			State::new(),
		)
	})
}

#[test]
fn lifecycle_order() {
	let tree = MemoryTree::new();
	let container = tree.create_root();
	let log = Log::default();
	let node = NodeRef::new();
	let probe = probe(&log, &tree, container, &node);

	let stage = Stage::mount(tree, container, VNode::class(&probe).attr("label", "a")).unwrap();
	assert_eq!(take(&log), ["will_mount", "render a", "did_mount attached=true"]);
	assert_eq!(stage.html(), "<p>a</p>");

	stage.show(VNode::class(&probe).attr("label", "b")).unwrap();
	assert_eq!(
		take(&log),
		[
			"will_receive_props b",
			"should_update",
			"will_update",
			"render b",
			"snapshot shown=a",
			"did_update a -> b snapshot=a shown=b",
		]
	);

	stage.root.unmount().unwrap();
	assert_eq!(take(&log), ["will_unmount"]);
	assert_eq!(stage.html(), "");
	assert_eq!(node.node(), None);
}

struct Shell {
	name: &'static str,
	log: Log,
}

impl Component for Shell {
	fn render(&self, scope: &Scope<'_>) -> Result<VNode, Error> {
		Ok(VNode::element("div").attr("class", self.name).children(scope.props().children().iter().cloned()))
	}

	fn did_mount(&mut self, _: &Scope<'_>) -> Result<(), Error> {
		self.log.borrow_mut().push(format!("did_mount {}", self.name));
		Ok(())
	}

	fn will_unmount(&mut self, _: &Scope<'_>) {
		self.log.borrow_mut().push(format!("will_unmount {}", self.name));
	}
}

fn shell(name: &'static str, log: &Log) -> ComponentClass {
	let log = Rc::clone(log);
	ComponentClass::new(name, move |_| (Shell { name, log: Rc::clone(&log) }, State::new()))
}

#[test]
fn children_mount_first_and_unmount_last() {
	let log = Log::default();
	let outer = shell("outer", &log);
	let inner = shell("inner", &log);

	let stage = Stage::new(VNode::class(&outer).child(VNode::class(&inner).child("leaf")));
	assert_eq!(stage.html(), "<div class=\"outer\"><div class=\"inner\">leaf</div></div>");
	assert_eq!(take(&log), ["did_mount inner", "did_mount outer"]);

	stage.show(VNode::empty()).unwrap();
	assert_eq!(take(&log), ["will_unmount outer", "will_unmount inner"]);
	assert_eq!(stage.html(), "");
	assert!(stage.tree.children(stage.container).is_empty());
}

#[test]
fn class_kind_change_remounts() {
	let log = Log::default();
	let first = shell("first", &log);
	let second = shell("second", &log);

	let stage = Stage::new(VNode::class(&first));
	stage.show(VNode::class(&first)).unwrap();
	assert_eq!(take(&log), ["did_mount first"]);

	stage.show(VNode::class(&second)).unwrap();
	assert_eq!(take(&log), ["will_unmount first", "did_mount second"]);
	assert_eq!(stage.html(), "<div class=\"second\"></div>");
}

struct Gate;
impl Component for Gate {
	fn render(&self, scope: &Scope<'_>) -> Result<VNode, Error> {
		let count = scope.state().get("count").and_then(Value::as_int).unwrap_or_default();
		Ok(VNode::element("p").child(count.to_string()))
	}

	fn should_update(&self, _: &Scope<'_>, _: &Props, next_state: &State) -> bool {
		next_state.get("open").and_then(Value::as_bool).unwrap_or(true)
	}
}

#[test]
fn skipped_updates_still_commit_state() {
	let gate = ComponentClass::new("Gate", |_| (Gate, map([("count", 0)])));
	let gate_ref = NodeRef::new();
	let stage = Stage::new(VNode::class(&gate).with_ref(&gate_ref));
	let updater = updater(&gate_ref);

	updater.set_state(map([("open", Value::from(false)), ("count", Value::from(1))])).unwrap();
	assert_eq!(stage.html(), "<p>0</p>");
	assert_eq!(updater.state().unwrap().get("count"), Some(&Value::Int(1)));

	updater.set_state(map([("open", true)])).unwrap();
	assert_eq!(stage.html(), "<p>1</p>");
}

struct Doubler;
impl Component for Doubler {
	fn render(&self, scope: &Scope<'_>) -> Result<VNode, Error> {
		let double = scope.state().get("double").and_then(Value::as_int).unwrap_or_default();
		Ok(VNode::text(double.to_string()))
	}
}

#[test]
fn state_is_derived_from_props_before_every_render() {
	let doubler = ComponentClass::with_derived_state("Doubler", |_| (Doubler, State::new()), |props, _| {
		let n = props.get("n").and_then(Value::as_int)?;
		Some(map([("double", n * 2)]))
	});

	let stage = Stage::new(VNode::class(&doubler).attr("n", 2));
	assert_eq!(stage.html(), "4");

	stage.show(VNode::class(&doubler).attr("n", 5)).unwrap();
	assert_eq!(stage.html(), "10");

	stage.show(VNode::class(&doubler)).unwrap();
	assert_eq!(stage.html(), "10");
}

#[test]
fn updates_after_unmount_are_dropped() {
	let gate = ComponentClass::new("Gate", |_| (Gate, map([("count", 0)])));
	let gate_ref = NodeRef::new();
	let stage = Stage::new(VNode::class(&gate).with_ref(&gate_ref));
	let updater = updater(&gate_ref);

	stage.root.unmount().unwrap();
	assert!(gate_ref.get().is_none());
	updater.set_state(map([("count", 1)])).unwrap();
	assert!(updater.state().is_none());
	assert_eq!(stage.html(), "");
}

#[test]
fn mounting_twice_and_unmounting_nothing_are_errors() {
	let stage = Stage::new(VNode::text("mounted"));
	assert!(matches!(stage.root.render(VNode::empty(), stage.container), Err(Error::AlreadyMounted)));

	stage.root.unmount().unwrap();
	assert!(!stage.root.is_mounted());
	assert!(matches!(stage.root.unmount(), Err(Error::NotMounted)));
	assert!(matches!(stage.root.request_render(), Err(Error::NotMounted)));

	stage.root.render(VNode::text("again"), stage.container).unwrap();
	assert_eq!(stage.html(), "again");
}

#[derive(Debug)]
struct Refused;
impl std::fmt::Display for Refused {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("refused to mount")
	}
}
impl std::error::Error for Refused {}

struct Refusing;
impl Component for Refusing {
	fn render(&self, _: &Scope<'_>) -> Result<VNode, Error> {
		Ok(VNode::empty())
	}

	fn did_mount(&mut self, _: &Scope<'_>) -> Result<(), Error> {
		Err(Error::component(Refused))
	}
}

#[test]
fn component_errors_abort_the_flush() {
	let refusing = ComponentClass::new("Refusing", |_| (Refusing, State::new()));
	let tree = MemoryTree::new();
	let container = tree.create_root();
	let root = Root::new(tree);

	match root.render(VNode::class(&refusing), container) {
		Err(error @ Error::Component(_)) => assert_eq!(error.to_string(), "refused to mount"),
		other => panic!("Expected a component error, found {:?}", other),
	}
}

#[test]
fn depth_limit() {
	let tree = MemoryTree::new();
	let container = tree.create_root();
	let root = Root::with_options(tree.clone(), Options { depth_limit: 3, ..Options::default() });

	let nested = VNode::element("div").child(VNode::element("div").child(VNode::element("div").child(VNode::element("div"))));
	assert!(matches!(root.render(nested, container), Err(Error::DepthLimitExceeded { limit: 3 })));

	let shallow = Root::with_options(tree.clone(), Options { depth_limit: 3, ..Options::default() });
	let container = tree.create_root();
	shallow.render(VNode::element("div").child(VNode::element("div")), container).unwrap();
	assert_eq!(tree.inner_html(container), "<div><div></div></div>");
}

/// Shows "x" while its `on` state is set, and nothing otherwise.
struct Toggle;
impl Component for Toggle {
	fn render(&self, scope: &Scope<'_>) -> Result<VNode, Error> {
		Ok(match scope.state().get("on").and_then(Value::as_bool) {
			Some(true) => VNode::text("x"),
			_ => VNode::empty(),
		})
	}
}

#[test]
fn empty_class_components_keep_their_position() {
	let toggle = ComponentClass::new("Toggle", |_| (Toggle, State::new()));
	let toggle_ref = NodeRef::new();
	let stage = Stage::new(VNode::fragment(vec![VNode::class(&toggle).with_ref(&toggle_ref), VNode::element("span").child("end")]));
	assert_eq!(stage.html(), "<span>end</span>");

	let toggle = updater(&toggle_ref);
	toggle.set_state(map([("on", true)])).unwrap();
	assert_eq!(stage.html(), "x<span>end</span>");

	toggle.set_state(map([("on", false)])).unwrap();
	assert_eq!(stage.html(), "<span>end</span>");
	toggle.set_state(map([("on", true)])).unwrap();
	assert_eq!(stage.html(), "x<span>end</span>");

	toggle.set_state(map([("on", false)])).unwrap();
	stage.show(VNode::text("only")).unwrap();
	assert_eq!(stage.html(), "only");
	assert_eq!(stage.tree.children(stage.container).len(), 1);
}

/// Records whether its ref still points at it when it is about to unmount.
struct Watched {
	node_ref: NodeRef,
	log: Log,
}

impl Component for Watched {
	fn render(&self, _: &Scope<'_>) -> Result<VNode, Error> {
		Ok(VNode::text("watched"))
	}

	fn will_unmount(&mut self, _: &Scope<'_>) {
		self.log.borrow_mut().push(format!("will_unmount ref set={}", self.node_ref.get().is_some()));
	}
}

#[test]
fn refs_are_cleared_after_will_unmount() {
	let log = Log::default();
	let node_ref = NodeRef::new();
	let watched = {
		let (log, node_ref) = (Rc::clone(&log), node_ref.clone());
		ComponentClass::new("Watched", move |_| {
			(
				Watched {
					node_ref: node_ref.clone(),
					log: Rc::clone(&log),
				},
				State::new(),
			)
		})
	};

	let stage = Stage::new(VNode::class(&watched).with_ref(&node_ref));
	assert!(node_ref.get().is_some());

	stage.show(VNode::empty()).unwrap();
	assert_eq!(take(&log), ["will_unmount ref set=true"]);
	assert!(node_ref.get().is_none());
}
