//! Store behaviour through the public API: paths, scoping, overlays and
//! change notifications.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use varstore::{Context, Store, StoreError, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn obj(pairs: &[(&str, Value)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect(),
    )
}

fn arr(items: &[Value]) -> Value {
    Value::Array(items.to_vec())
}

/// A handler that forwards `(label, id, value)` into `tx`.
fn recorder(label: &'static str, tx: mpsc::UnboundedSender<(&'static str, String, Value)>) -> Value {
    Value::function(move |_, args| {
        let id = args.first().map(Value::to_key).unwrap_or_default();
        let value = args.get(1).cloned().unwrap_or_default();
        let _ = tx.send((label, id, value));
        Value::Unset
    })
}

const WAIT: Duration = Duration::from_secs(5);

// ── Paths ─────────────────────────────────────────────────────────────────────

#[test]
fn nested_object_path() {
    let store = Store::new("paths").unwrap();
    store
        .set_value(
            "employee",
            obj(&[("name", obj(&[("username", "sangupta".into())]))]),
        )
        .unwrap();
    assert_eq!(
        store.get_value("employee.name.username").unwrap(),
        Value::from("sangupta")
    );
    assert!(store.exists("employee.name").unwrap());
    assert!(!store.exists("employee.age").unwrap());
}

#[test]
fn array_index_path() {
    let store = Store::new("paths").unwrap();
    let items: Vec<Value> = (1..=10).map(Value::from).collect();
    store.set_value("arr", items).unwrap();
    assert_eq!(store.get_value("arr[3]").unwrap(), Value::from(4));
    assert_eq!(store.get_value("arr[\"0\"]").unwrap(), Value::from(1));
    assert_eq!(store.get_value("arr[99]").unwrap(), Value::Unset);
}

#[test]
fn mixed_dot_and_bracket_path() {
    let store = Store::new("paths").unwrap();
    let employees = arr(&[
        obj(&[("name", obj(&[("first", "Ada".into())]))]),
        obj(&[("name", obj(&[("first", "Grace".into())]))]),
    ]);
    store.set_value("data", obj(&[("employees", employees)])).unwrap();
    assert_eq!(
        store.get_value("data.employees[1].name.first").unwrap(),
        Value::from("Grace")
    );
}

#[test]
fn bracket_on_missing_value_is_invalid_path() {
    let store = Store::new("paths").unwrap();
    store.set_value("n", 5).unwrap();
    store.set_value("nothing", Value::Null).unwrap();
    store.set_value("blank", Value::Unset).unwrap();
    assert!(matches!(store.get_value("n[0]"), Err(StoreError::InvalidPath { .. })));
    assert!(matches!(store.get_value("nothing[0]"), Err(StoreError::InvalidPath { .. })));
    assert!(matches!(store.get_value("blank[0]"), Err(StoreError::InvalidPath { .. })));
    // a name that was never bound simply does not exist
    assert_eq!(store.get_value("missing[0]").unwrap(), Value::Unset);
    assert!(!store.exists("missing[0]").unwrap());
}

#[test]
fn writes_create_intermediate_containers() {
    let store = Store::new("paths").unwrap();
    store.set_value("a.b[2].c", "deep").unwrap();
    assert_eq!(store.get_value("a.b[2].c").unwrap(), Value::from("deep"));

    let Value::Object(a) = store.get_value("a").unwrap() else {
        panic!("`a` should be an object");
    };
    let Some(Value::Array(b)) = a.get("b") else {
        panic!("`a.b` should be an array");
    };
    assert_eq!(b.len(), 3);
    assert_eq!(b[0], Value::Unset);

    store.set_value("list[1]", 7).unwrap();
    assert_eq!(store.get_value("list").unwrap(), arr(&[Value::Unset, 7.into()]));
}

#[test]
fn writing_through_a_primitive_fails() {
    let store = Store::new("paths").unwrap();
    store.set_value("n", 1).unwrap();
    assert!(matches!(store.set_value("n.x", 2), Err(StoreError::InvalidPath { .. })));
}

// ── Round trips ───────────────────────────────────────────────────────────────

#[test]
fn every_variant_round_trips() {
    let store = Store::new("values").unwrap();
    let f = Value::function(|_, _| Value::Null);
    let values = [
        Value::Null,
        Value::Bool(false),
        Value::from(3.25),
        Value::from("text"),
        arr(&[1.into(), Value::Null, "x".into()]),
        obj(&[("inner", obj(&[("k", 1.into())]))]),
        f,
        Value::Store(store.clone()),
    ];
    for (i, v) in values.iter().enumerate() {
        let key = format!("k{i}");
        store.set_value(&key, v.clone()).unwrap();
        assert_eq!(&store.get_value(&key).unwrap(), v, "variant {i}");
    }
}

#[test]
fn unset_then_overwritten() {
    let store = Store::new("values").unwrap();
    store.set_value("k", Value::Unset).unwrap();
    assert_eq!(store.get_value("k").unwrap(), Value::Unset);
    store.set_value("k", 1).unwrap();
    assert_eq!(store.get_value("k").unwrap(), Value::from(1));
}

// ── Scoping ───────────────────────────────────────────────────────────────────

#[test]
fn fork_isolation() {
    let parent = Store::new("parent").unwrap();
    parent.set_value("before", 1).unwrap();
    let child = parent.fork("child").unwrap();

    child.set_value("after", 2).unwrap();
    assert_eq!(child.get_value("before").unwrap(), Value::from(1));
    assert_eq!(parent.get_value("after").unwrap(), Value::Unset);
    assert_eq!(child.parent(), Some(&parent));
    assert_eq!(child.name(), "child");
}

#[test]
fn fork_with_state_seeds_child() {
    let parent = Store::new("parent").unwrap();
    let child = parent
        .fork_with_state("child", Context::from([("seed".to_owned(), Value::from(9))]))
        .unwrap();
    assert_eq!(child.get_value("seed").unwrap(), Value::from(9));
    assert!(matches!(parent.fork(" "), Err(StoreError::NameRequired)));
}

#[test]
fn overlays_shadow_nested_paths() {
    let store = Store::new("overlay").unwrap();
    store.set_value("cfg", obj(&[("mode", "base".into())])).unwrap();
    store.push_context(Context::from([("cfg".to_owned(), obj(&[]))]));
    // a missing key falls through to lower layers ...
    assert_eq!(store.get_value("cfg.mode").unwrap(), Value::from("base"));
    // ... but a bracket step on the overlay's container stops there
    assert!(store.exists("cfg['mode']").unwrap());
    assert_eq!(store.get_value("cfg['mode']").unwrap(), Value::Unset);
    store.pop_context();
    assert_eq!(store.get_value("cfg['mode']").unwrap(), Value::from("base"));
}

#[test]
fn stack_discipline_restores_prior_value() {
    let store = Store::new("stack").unwrap();
    let one = |v: i32| Context::from([("k".to_owned(), Value::from(v))]);
    store.push_context(one(1));
    assert_eq!(store.get_value("k").unwrap(), Value::from(1));
    store.push_context(one(2));
    assert_eq!(store.get_value("k").unwrap(), Value::from(2));
    store.pop_context();
    assert_eq!(store.get_value("k").unwrap(), Value::from(1));
    store.pop_context();
    assert_eq!(store.get_value("k").unwrap(), Value::Unset);
    assert_eq!(store.pop_context(), None);
}

#[test]
fn stores_are_shareable_across_threads() {
    let root = Store::new("root").unwrap();
    root.set_value("shared", 10).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let child = root.fork(format!("worker-{n}")).unwrap();
            std::thread::spawn(move || {
                child.set_value("n", n).unwrap();
                child.get_value("shared").unwrap().to_number() + child.get_value("n").unwrap().to_number()
            })
        })
        .collect();
    let total: f64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 46.0);
    assert_eq!(root.get_value("n").unwrap(), Value::Unset);
}

// ── Notifications ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_value_notifies_subscriber() {
    let store = Store::new("notify").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    store.subscribe("count", recorder("a", tx)).unwrap();

    store.set_value("count", 5).unwrap();
    let (label, id, value) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!((label, id.as_str(), value), ("a", "count", Value::from(5)));
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let store = Store::new("notify").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    store.subscribe("k", recorder("first", tx.clone())).unwrap();
    store.subscribe("k", recorder("second", tx)).unwrap();

    store.set_value("k", true).unwrap();
    let a = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let b = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!((a.0, b.0), ("first", "second"));
}

#[tokio::test]
async fn handlers_run_off_the_callers_thread() {
    let store = Store::new("notify").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    store
        .subscribe(
            "k",
            Value::function(move |_, _| {
                let _ = tx.send(std::thread::current().id());
                Value::Unset
            }),
        )
        .unwrap();

    store.set_value("k", 1).unwrap();
    let handler_thread = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_ne!(handler_thread, std::thread::current().id());
}

#[tokio::test]
async fn touch_sends_current_value() {
    let store = Store::new("notify").unwrap();
    store.set_value("k", "now").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    store.subscribe("k", recorder("a", tx)).unwrap();

    store.touch("k", None).unwrap();
    let (_, _, value) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(value, Value::from("now"));
}

#[tokio::test]
async fn unsubscribed_handler_is_not_called() {
    let store = Store::new("notify").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let a = recorder("a", tx.clone());
    let b = recorder("b", tx);
    store.subscribe("k", a.clone()).unwrap();
    store.subscribe("k", b).unwrap();
    assert!(store.unsubscribe("k", &a).unwrap());

    store.set_value("k", 1).unwrap();
    let (label, _, _) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(label, "b");
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

#[tokio::test]
async fn super_write_notifies_parent_watchers() {
    let parent = Store::new("parent").unwrap();
    let child = parent.fork("child").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    parent.subscribe("x", recorder("parent", tx)).unwrap();

    child.set_value("super.x", 3).unwrap();
    let (label, id, value) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!((label, id.as_str(), value), ("parent", "x", Value::from(3)));
    assert_eq!(parent.get_value("x").unwrap(), Value::from(3));
}

#[test]
fn notifications_without_a_runtime() {
    let store = Store::new("notify").unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    store
        .subscribe(
            "k",
            Value::function(move |_, args| {
                if let Ok(tx) = tx.lock() {
                    let _ = tx.send(args.get(1).cloned().unwrap_or_default());
                }
                Value::Unset
            }),
        )
        .unwrap();
    store.set_value("k", 42).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Value::from(42));
}

#[test]
fn repeated_writes_notify_in_order_without_a_runtime() {
    let store = Store::new("notify").unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    store
        .subscribe(
            "k",
            Value::function(move |_, args| {
                if let Ok(tx) = tx.lock() {
                    let value = args.get(1).cloned().unwrap_or_default();
                    let _ = tx.send((value, std::thread::current().id()));
                }
                Value::Unset
            }),
        )
        .unwrap();
    for n in 0..200 {
        store.set_value("k", n).unwrap();
    }
    let seen: Vec<_> = (0..200).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    let values: Vec<Value> = seen.iter().map(|(v, _)| v.clone()).collect();
    assert_eq!(values, (0..200).map(Value::from).collect::<Vec<_>>());
    assert!(seen.iter().all(|(_, thread)| *thread == seen[0].1));
}
