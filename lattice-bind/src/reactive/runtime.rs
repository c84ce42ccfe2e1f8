//! Reactive Runtime
//!
//! Entry points that accept arbitrary [`Value`]s. Binders hold values that
//! may or may not be signals; these functions check and fail with
//! [`ReactiveError::InvalidArgument`] when handed a plain value.

use std::rc::Rc;

use crate::error::ReactiveError;
use crate::value::Value;

use super::subscriber::StopHandle;
use super::Signal;

fn require_signal(value: &Value, operation: &'static str) -> Result<Signal, ReactiveError> {
    value
        .as_signal()
        .cloned()
        .ok_or(ReactiveError::InvalidArgument(operation))
}

/// Observe a signal held in a value.
pub fn observe<F>(value: &Value, callback: F, immediate: bool) -> Result<StopHandle, ReactiveError>
where
    F: Fn(&Value, Option<&Value>) + 'static,
{
    let signal = require_signal(value, "observe")?;
    Ok(signal.observe(callback, immediate))
}

/// Observe several signals with one callback, which receives every current
/// value in order whenever any of them changes.
pub fn observe_many<F>(signals: &[Signal], callback: F, immediate: bool) -> StopHandle
where
    F: Fn(&[Value]) + 'static,
{
    let callback = Rc::new(callback);
    let sources: Rc<[Signal]> = signals.into();
    let fire = {
        let sources = sources.clone();
        move || {
            let values: Vec<Value> = sources.iter().map(Signal::read_untracked).collect();
            callback(&values);
        }
    };
    let fire = Rc::new(fire);

    let handles = sources
        .iter()
        .map(|signal| {
            let fire = fire.clone();
            signal.observe(move |_, _| fire(), false)
        })
        .collect();
    if immediate {
        super::context::silence(|| fire());
    }
    StopHandle::all(handles)
}

pub fn pause(value: &Value) -> Result<(), ReactiveError> {
    require_signal(value, "pause")?.pause();
    Ok(())
}

pub fn resume(value: &Value) -> Result<(), ReactiveError> {
    require_signal(value, "resume")?.resume();
    Ok(())
}

/// Notify the subscribers of the signal held in `value`, passing `source`
/// through to every callback.
pub fn trigger(value: &Value, source: Option<&Value>) -> Result<(), ReactiveError> {
    require_signal(value, "trigger")?.trigger(source);
    Ok(())
}

/// Read through a signal without tracking; plain values pass through.
pub fn unref(value: &Value) -> Value {
    value.unwrap_untracked()
}

pub fn is_signal(value: &Value) -> bool {
    value.is_signal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn plain_values_are_rejected() {
        let plain = Value::from(1);
        assert_eq!(
            observe(&plain, |_, _| {}, false).err(),
            Some(ReactiveError::InvalidArgument("observe"))
        );
        assert!(pause(&plain).is_err());
        assert!(resume(&plain).is_err());
        let err = trigger(&plain, None).unwrap_err();
        assert_eq!(err.to_string(), "trigger requires a reactive source");
    }

    #[test]
    fn observe_accepts_signal_values() {
        let signal = Signal::new(1);
        let seen = std::rc::Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let stop = observe(
            &Value::Signal(signal.clone()),
            move |v, _| sink.borrow_mut().push(v.clone()),
            true,
        )
        .unwrap();

        signal.write(2).unwrap();
        stop.stop();
        signal.write(3).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn observe_many_reports_all_values() {
        let a = Signal::new(1);
        let b = Signal::new("x");
        let seen = std::rc::Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let stop = observe_many(
            &[a.clone(), b.clone()],
            move |values| sink.borrow_mut().push(values.to_vec()),
            false,
        );

        b.write("y").unwrap();
        assert_eq!(*seen.borrow(), vec![vec![Value::from(1), Value::from("y")]]);

        stop.stop();
        a.write(2).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(a.dependent_count(), 0);
    }

    #[test]
    fn pause_and_trigger_through_values() {
        let signal = Signal::new(0);
        let value = Value::Signal(signal.clone());
        let hits = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = hits.clone();
        let _stop = signal.observe(move |_, _| counter.set(counter.get() + 1), false);

        pause(&value).unwrap();
        signal.write(1).unwrap();
        assert_eq!(hits.get(), 0);
        trigger(&value, None).unwrap();
        assert_eq!(hits.get(), 1);
        resume(&value).unwrap();
        assert!(!signal.is_paused());
        assert_eq!(unref(&value), Value::from(1));
    }
}
