use reconcile_dom::{memory::MemoryTree, Cleanup, Context, Dispatch, Error, ForwardRef, FunctionComponent, NodeRef, SetState, VNode, Value};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod stage_;
use stage_::Stage;

type Log = Rc<RefCell<Vec<String>>>;

fn take(log: &Log) -> Vec<String> {
	log.borrow_mut().drain(..).collect()
}

fn word(value: Option<&Value>) -> String {
	value.and_then(Value::as_str).unwrap_or_default().to_owned()
}

#[test]
fn state_is_kept_per_position() {
	let setters: Rc<RefCell<Vec<SetState<i64>>>> = Rc::default();
	let counter = {
		let setters = Rc::clone(&setters);
		FunctionComponent::new("Counter", move |_, hooks| {
			let (count, set_count) = hooks.use_state(|| 0_i64)?;
			setters.borrow_mut().push(set_count);
			Ok(VNode::element("span").child(count.to_string()))
		})
	};

	let stage = Stage::new(VNode::element("div").child(VNode::function(&counter)).child(VNode::function(&counter)));
	let (first, second) = {
		let setters = setters.borrow();
		(setters[0].clone(), setters[1].clone())
	};

	first.set(3).unwrap();
	assert_eq!(stage.html(), "<div><span>3</span><span>0</span></div>");

	second.update(|count| count + 10).unwrap();
	assert_eq!(stage.html(), "<div><span>3</span><span>10</span></div>");

	stage.show(VNode::empty()).unwrap();
	first.set(4).unwrap();
	assert_eq!(stage.html(), "");
}

#[test]
fn memo_recomputes_only_when_deps_change() {
	let seen: Rc<RefCell<Vec<Rc<String>>>> = Rc::default();
	let shout = {
		let seen = Rc::clone(&seen);
		FunctionComponent::new("Shout", move |props, hooks| {
			let upper = hooks.use_memo(word(props.get("word")), |word| Rc::new(word.to_uppercase()))?;
			seen.borrow_mut().push(Rc::clone(&upper));
			Ok(VNode::text((*upper).clone()))
		})
	};

	let stage = Stage::new(VNode::function(&shout).attr("word", "a"));
	stage.show(VNode::function(&shout).attr("word", "a")).unwrap();
	stage.show(VNode::function(&shout).attr("word", "b")).unwrap();

	assert_eq!(stage.html(), "B");
	let seen = seen.borrow();
	assert!(Rc::ptr_eq(&seen[0], &seen[1]));
	assert!(!Rc::ptr_eq(&seen[1], &seen[2]));
}

#[test]
fn callbacks_are_kept_until_deps_change() {
	let seen: Rc<RefCell<Vec<Rc<dyn Fn() -> String>>>> = Rc::default();
	let greeter = {
		let seen = Rc::clone(&seen);
		FunctionComponent::new("Greeter", move |props, hooks| {
			let name = word(props.get("name"));
			let greet: Rc<dyn Fn() -> String> = {
				let name = name.clone();
				Rc::new(move || format!("Hello, {}!", name))
			};
			let greet = hooks.use_callback(name, greet)?;
			seen.borrow_mut().push(greet);
			Ok(VNode::empty())
		})
	};

	let stage = Stage::new(VNode::function(&greeter).attr("name", "Ann"));
	stage.show(VNode::function(&greeter).attr("name", "Ann")).unwrap();
	stage.show(VNode::function(&greeter).attr("name", "Bo")).unwrap();

	let seen = seen.borrow();
	assert!(Rc::ptr_eq(&seen[0], &seen[1]));
	assert_eq!(seen[1](), "Hello, Ann!");
	assert_eq!(seen[2](), "Hello, Bo!");
}

#[test]
fn effects_run_on_flush_after_the_tree_is_updated() {
	let tree = MemoryTree::new();
	let container = tree.create_root();
	let log = Log::default();
	let setter: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();

	let component = {
		let (tree, log, setter) = (tree.clone(), Rc::clone(&log), Rc::clone(&setter));
		FunctionComponent::new("Effects", move |_, hooks| {
			let (count, set_count) = hooks.use_state(|| 0_i64)?;
			*setter.borrow_mut() = Some(set_count);

			let (tree, log) = (tree.clone(), Rc::clone(&log));
			hooks.use_effect(move || {
				log.borrow_mut().push(format!("effect {} sees {}", count, tree.inner_html(container)));
				Some(Box::new(move || log.borrow_mut().push(format!("cleanup {}", count))) as Cleanup)
			})?;
			Ok(VNode::text(count.to_string()))
		})
	};

	let stage = Stage::mount(tree, container, VNode::function(&component)).unwrap();
	assert!(stage.root.has_pending_effects());
	assert!(take(&log).is_empty());

	stage.root.flush_effects().unwrap();
	assert!(!stage.root.has_pending_effects());
	assert_eq!(take(&log), ["effect 0 sees 0"]);

	let set_count = setter.borrow().clone().unwrap();
	set_count.set(1).unwrap();
	assert!(take(&log).is_empty());
	stage.root.flush_effects().unwrap();
	assert_eq!(take(&log), ["cleanup 0", "effect 1 sees 1"]);

	stage.root.unmount().unwrap();
	assert_eq!(take(&log), ["cleanup 1"]);
}

#[test]
fn effects_with_deps_skip_unchanged_renders() {
	let log = Log::default();
	let component = {
		let log = Rc::clone(&log);
		FunctionComponent::new("Title", move |props, hooks| {
			let title = word(props.get("title"));
			let log = Rc::clone(&log);
			hooks.use_effect_with(title.clone(), move || {
				log.borrow_mut().push(format!("title {}", title));
				None
			})?;
			Ok(VNode::empty())
		})
	};

	let stage = Stage::new(VNode::function(&component).attr("title", "a"));
	stage.root.flush_effects().unwrap();
	stage.show(VNode::function(&component).attr("title", "a")).unwrap();
	stage.root.flush_effects().unwrap();
	stage.show(VNode::function(&component).attr("title", "b")).unwrap();
	stage.root.flush_effects().unwrap();

	assert_eq!(take(&log), ["title a", "title b"]);
}

#[test]
fn layout_effects_run_before_the_update_returns() {
	let tree = MemoryTree::new();
	let container = tree.create_root();
	let log = Log::default();
	let setter: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();

	let component = {
		let (tree, log, setter) = (tree.clone(), Rc::clone(&log), Rc::clone(&setter));
		FunctionComponent::new("Measure", move |_, hooks| {
			let (count, set_count) = hooks.use_state(|| 0_i64)?;
			*setter.borrow_mut() = Some(set_count.clone());

			let (tree, log) = (tree.clone(), Rc::clone(&log));
			hooks.use_layout_effect_with(count, move || {
				log.borrow_mut().push(format!("layout {} sees {}", count, tree.inner_html(container)));
				if count == 1 {
					set_count.set(2).unwrap();
				}
				None
			})?;
			Ok(VNode::text(count.to_string()))
		})
	};

	let stage = Stage::mount(tree, container, VNode::function(&component)).unwrap();
	assert_eq!(take(&log), ["layout 0 sees 0"]);
	assert!(!stage.root.has_pending_effects());

	let set_count = setter.borrow().clone().unwrap();
	set_count.set(1).unwrap();
	assert_eq!(take(&log), ["layout 1 sees 1", "layout 2 sees 2"]);
	assert_eq!(stage.html(), "2");
}

#[test]
fn extra_hooks_violate_the_order() {
	let extra = Rc::new(Cell::new(false));
	let fickle = {
		let extra = Rc::clone(&extra);
		FunctionComponent::new("Fickle", move |_, hooks| {
			hooks.use_state(|| 0)?;
			if extra.get() {
				hooks.use_state(|| 1)?;
			}
			Ok(VNode::empty())
		})
	};

	let stage = Stage::new(VNode::function(&fickle));
	extra.set(true);
	let result = stage.show(VNode::function(&fickle));
	assert!(matches!(
		result,
		Err(Error::HookOrderViolation { ordinal: 1, expected: "end of render", found: "use_state" })
	));
}

#[test]
fn missing_hooks_violate_the_order() {
	let extra = Rc::new(Cell::new(true));
	let fickle = {
		let extra = Rc::clone(&extra);
		FunctionComponent::new("Fickle", move |_, hooks| {
			hooks.use_state(|| 0)?;
			if extra.get() {
				hooks.use_ref(|| 1)?;
			}
			Ok(VNode::empty())
		})
	};

	let stage = Stage::new(VNode::function(&fickle));
	extra.set(false);
	let result = stage.show(VNode::function(&fickle));
	assert!(matches!(
		result,
		Err(Error::HookOrderViolation { ordinal: 1, expected: "use_ref", found: "end of render" })
	));
}

#[test]
fn swapped_hooks_violate_the_order() {
	let swapped = Rc::new(Cell::new(false));
	let fickle = {
		let swapped = Rc::clone(&swapped);
		FunctionComponent::new("Fickle", move |_, hooks| {
			if swapped.get() {
				hooks.use_ref(|| 0)?;
			} else {
				hooks.use_state(|| 0)?;
			}
			Ok(VNode::empty())
		})
	};

	let stage = Stage::new(VNode::function(&fickle));
	swapped.set(true);
	let result = stage.show(VNode::function(&fickle));
	assert!(matches!(
		result,
		Err(Error::HookOrderViolation { ordinal: 0, expected: "use_ref", found: "use_state" })
	));
}

#[test]
fn memo_skips_equal_props_unless_own_state_changed() {
	let renders = Rc::new(Cell::new(0));
	let setter: Rc<RefCell<Option<SetState<String>>>> = Rc::default();
	let label = {
		let (renders, setter) = (Rc::clone(&renders), Rc::clone(&setter));
		FunctionComponent::new("Label", move |props, hooks| {
			renders.set(renders.get() + 1);
			let (suffix, set_suffix) = hooks.use_state(String::new)?;
			*setter.borrow_mut() = Some(set_suffix);
			Ok(VNode::text(format!("{}{}", word(props.get("label")), suffix)))
		})
	};
	let memo = label.memo();

	let stage = Stage::new(VNode::memo(&memo).attr("label", "a"));
	stage.show(VNode::memo(&memo).attr("label", "a")).unwrap();
	assert_eq!(renders.get(), 1);

	stage.show(VNode::memo(&memo).attr("label", "b")).unwrap();
	assert_eq!(renders.get(), 2);
	assert_eq!(stage.html(), "b");

	let set_suffix = setter.borrow().clone().unwrap();
	set_suffix.set("!".to_owned()).unwrap();
	assert_eq!(renders.get(), 3);
	assert_eq!(stage.html(), "b!");
}

#[test]
fn state_changes_below_a_memo_are_rendered() {
	let setter: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
	let (frame_renders, counter_renders) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
	let counter = {
		let (renders, setter) = (Rc::clone(&counter_renders), Rc::clone(&setter));
		FunctionComponent::new("Counter", move |_, hooks| {
			renders.set(renders.get() + 1);
			let (count, set_count) = hooks.use_state(|| 0_i64)?;
			*setter.borrow_mut() = Some(set_count);
			Ok(VNode::text(count.to_string()))
		})
	};
	let frame = {
		let renders = Rc::clone(&frame_renders);
		FunctionComponent::new("Frame", move |_, _| {
			renders.set(renders.get() + 1);
			Ok(VNode::element("p").child(VNode::function(&counter)))
		})
	};
	let memo = frame.memo();

	let stage = Stage::new(VNode::memo(&memo));
	assert_eq!(stage.html(), "<p>0</p>");

	let set_count = setter.borrow().clone().unwrap();
	set_count.set(1).unwrap();
	assert_eq!(stage.html(), "<p>1</p>");
	assert_eq!(counter_renders.get(), 2);

	// Nothing changed below the memo any more, so equal props skip it again.
	stage.show(VNode::memo(&memo)).unwrap();
	assert_eq!((frame_renders.get(), counter_renders.get()), (2, 2));
}

#[test]
fn custom_memo_comparison() {
	let renders = Rc::new(Cell::new(0));
	let label = {
		let renders = Rc::clone(&renders);
		FunctionComponent::new("Label", move |props, _| {
			renders.set(renders.get() + 1);
			Ok(VNode::text(word(props.get("label"))))
		})
	};
	let frozen = label.memo_with(|_, _| true);

	let stage = Stage::new(VNode::memo(&frozen).attr("label", "a"));
	stage.show(VNode::memo(&frozen).attr("label", "b")).unwrap();
	assert_eq!(renders.get(), 1);
	assert_eq!(stage.html(), "a");

	// Memoizing again yields a different kind, which remounts.
	let thawed = label.memo();
	stage.show(VNode::memo(&thawed).attr("label", "b")).unwrap();
	assert_eq!(renders.get(), 2);
	assert_eq!(stage.html(), "b");
}

#[test]
fn context_reaches_providers_descendants() {
	let theme = Context::new("light");
	let themed = {
		let theme = theme.clone();
		FunctionComponent::new("Themed", move |_, hooks| Ok(VNode::element("i").child(word(Some(&hooks.use_context(&theme))))))
	};
	let consumer = |theme: &Context| VNode::consumer(theme, |value| Ok(VNode::element("b").child(word(Some(value)))));

	let stage = Stage::new(
		VNode::element("div")
			.child(VNode::function(&themed))
			.child(VNode::provider(&theme, "dark").child(VNode::function(&themed)).child(consumer(&theme))),
	);
	assert_eq!(stage.html(), "<div><i>light</i><i>dark</i><b>dark</b></div>");

	stage.show(VNode::provider(&theme, "sepia").child(VNode::function(&themed)).child(consumer(&theme))).unwrap();
	assert_eq!(stage.html(), "<i>sepia</i><b>sepia</b>");

	stage.show(VNode::provider(&theme, "dusk").child(VNode::function(&themed)).child(consumer(&theme))).unwrap();
	assert_eq!(stage.html(), "<i>dusk</i><b>dusk</b>");
}

#[test]
fn forward_ref_passes_the_ref_through() {
	let fancy = ForwardRef::new("FancyInput", |_, node_ref, _| {
		let input = VNode::element("input").attr("class", "fancy");
		Ok(match node_ref {
			Some(node_ref) => input.with_ref(node_ref),
			None => input,
		})
	});
	let input_ref = NodeRef::new();

	let stage = Stage::new(VNode::forward_ref(&fancy).with_ref(&input_ref));
	assert_eq!(stage.html(), "<input class=\"fancy\"></input>");
	assert_eq!(input_ref.node(), Some(stage.top()));

	stage.show(VNode::empty()).unwrap();
	assert_eq!(input_ref.node(), None);
}

enum Tally {
	Add(i64),
	Reset,
}

#[test]
fn reducer_dispatches_are_batched_like_state() {
	let renders = Rc::new(Cell::new(0));
	let dispatcher: Rc<RefCell<Option<Dispatch<Tally>>>> = Rc::default();
	let tally = {
		let (renders, dispatcher) = (Rc::clone(&renders), Rc::clone(&dispatcher));
		FunctionComponent::new("Tally", move |_, hooks| {
			renders.set(renders.get() + 1);
			let (total, dispatch) = hooks.use_reducer(
				|total: &i64, action: Tally| match action {
					Tally::Add(n) => total + n,
					Tally::Reset => 0,
				},
				|| 0,
			)?;
			*dispatcher.borrow_mut() = Some(dispatch);
			Ok(VNode::text(total.to_string()))
		})
	};

	let stage = Stage::new(VNode::function(&tally));
	let dispatch = dispatcher.borrow().clone().unwrap();

	dispatch.dispatch(Tally::Add(2)).unwrap();
	assert_eq!(stage.html(), "2");
	assert_eq!(renders.get(), 2);

	stage
		.root
		.batch(|| {
			dispatch.dispatch(Tally::Add(3)).unwrap();
			dispatch.dispatch(Tally::Add(4)).unwrap();
		})
		.unwrap();
	assert_eq!(stage.html(), "9");
	assert_eq!(renders.get(), 3);

	dispatch.dispatch(Tally::Reset).unwrap();
	assert_eq!(stage.html(), "0");
}

#[test]
fn refs_persist_without_rerendering() {
	let cell: Rc<RefCell<Option<Rc<RefCell<usize>>>>> = Rc::default();
	let component = {
		let cell = Rc::clone(&cell);
		FunctionComponent::new("Renders", move |_, hooks| {
			let renders = hooks.use_ref(|| 0_usize)?;
			*renders.borrow_mut() += 1;
			let text = renders.borrow().to_string();
			*cell.borrow_mut() = Some(renders);
			Ok(VNode::text(text))
		})
	};

	let stage = Stage::new(VNode::function(&component));
	stage.show(VNode::function(&component)).unwrap();
	assert_eq!(stage.html(), "2");

	let renders = cell.borrow().clone().unwrap();
	*renders.borrow_mut() = 10;
	assert_eq!(stage.html(), "2");

	stage.show(VNode::function(&component)).unwrap();
	assert_eq!(stage.html(), "11");
}
