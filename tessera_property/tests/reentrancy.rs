// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Modifier chain and notification dispatch tests for `tessera_property`.
//!
//! Handlers receive the manager mutably, so these exercise mutation from
//! inside a running dispatch: self-removal, sibling removal, registration and
//! nested property changes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessera_property::{
    ChangeFlags, ChangeReason, ModifierError, NotificationHandle, ObjectKey, PropertyManager,
    PropertyType, PropertyTypeBuilder, PropertyValue,
};

fn setup() -> (PropertyManager, PropertyType<f32>, ObjectKey) {
    let mut manager = PropertyManager::new();
    let width = manager
        .register(PropertyTypeBuilder::new("Width", 0.0_f32).change_flags(ChangeFlags::LAYOUT))
        .unwrap();
    let node = manager.create_object().unwrap();
    (manager, width, node)
}

fn offset(delta: f32) -> impl Fn(&mut PropertyValue) -> Result<(), ModifierError> {
    move |value| match value {
        PropertyValue::Float(f) => {
            *f += delta;
            Ok(())
        }
        _ => Err(ModifierError::new("expected a float")),
    }
}

fn scale(factor: f32) -> impl Fn(&mut PropertyValue) -> Result<(), ModifierError> {
    move |value| match value {
        PropertyValue::Float(f) => {
            *f *= factor;
            Ok(())
        }
        _ => Err(ModifierError::new("expected a float")),
    }
}

#[test]
fn modifiers_run_in_insertion_order() {
    let (mut manager, width, node) = setup();
    manager.set(node, width, 10.0).unwrap();
    let add = manager.add_value_modifier(node, width, offset(5.0)).unwrap();
    let mul = manager.add_value_modifier(node, width, scale(2.0)).unwrap();
    assert_eq!(manager.get(node, width).unwrap(), Some(30.0));

    // Removing out of order keeps the rest of the chain intact.
    assert!(manager.remove_value_modifier(node, width, add));
    assert_eq!(manager.get(node, width).unwrap(), Some(20.0));
    assert!(!manager.remove_value_modifier(node, width, add));
    assert!(manager.remove_value_modifier(node, width, mul));
    assert_eq!(manager.get(node, width).unwrap(), Some(10.0));
}

#[test]
fn invalidated_modifier_reruns_on_next_resolution() {
    let (mut manager, width, node) = setup();
    manager.set(node, width, 1.0).unwrap();
    let calls = Rc::new(Cell::new(0_u32));
    let counted = calls.clone();
    let modifier = manager
        .add_value_modifier(node, width, move |_| {
            counted.set(counted.get() + 1);
            Ok(())
        })
        .unwrap();
    manager.take_change_flags(node);
    manager.clear_property_changed(node, width);

    manager.get(node, width).unwrap();
    assert_eq!(manager.is_value_modifier_valid(node, width, modifier), Some(true));

    let before = calls.get();
    assert!(manager.invalidate_value_modifier(node, width, modifier));
    assert_eq!(calls.get(), before, "invalidation does not recompute");
    assert_eq!(manager.is_value_modifier_valid(node, width, modifier), Some(false));
    assert!(manager.is_property_changed(node, width));

    manager.get(node, width).unwrap();
    assert_eq!(calls.get(), before + 1);
    assert_eq!(manager.is_value_modifier_valid(node, width, modifier), Some(true));
}

#[test]
fn failing_modifier_aborts_only_the_current_pass() {
    let (mut manager, width, node) = setup();
    manager.set(node, width, 2.0).unwrap();
    let armed = Rc::new(Cell::new(true));
    let trigger = armed.clone();
    let failing = manager
        .add_value_modifier(node, width, move |_| {
            if trigger.get() {
                Err(ModifierError::new("binding source missing"))
            } else {
                Ok(())
            }
        })
        .unwrap();
    manager.add_value_modifier(node, width, offset(1.0)).unwrap();

    assert!(manager.get(node, width).is_err());
    assert_eq!(manager.get_default(node, width), 2.0);
    assert_eq!(manager.is_value_modifier_valid(node, width, failing), Some(false));

    armed.set(false);
    assert_eq!(manager.get(node, width).unwrap(), Some(3.0));
}

#[test]
fn instance_handlers_run_before_type_handlers() {
    let (mut manager, width, node) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    for (scope, tag) in [(None, "type-1"), (Some(node), "instance-1"), (None, "type-2")] {
        let log = log.clone();
        manager
            .add_notification_handler(scope, width, move |_, change| {
                assert_eq!(change.reason, ChangeReason::ValueChanged);
                log.borrow_mut().push(tag);
            })
            .unwrap();
    }
    manager.set(node, width, 1.0).unwrap();
    assert_eq!(*log.borrow(), ["instance-1", "type-1", "type-2"]);
}

#[test]
fn handler_removing_itself_does_not_skip_siblings() {
    let (mut manager, width, node) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let own: Rc<Cell<Option<NotificationHandle>>> = Rc::new(Cell::new(None));

    let (first_log, first_handle) = (log.clone(), own.clone());
    let first = manager
        .add_notification_handler(Some(node), width, move |manager, _| {
            first_log.borrow_mut().push("first");
            if let Some(handle) = first_handle.get() {
                assert!(manager.remove_notification_handler(Some(node), width, handle));
            }
        })
        .unwrap();
    own.set(Some(first));
    let second_log = log.clone();
    manager
        .add_notification_handler(Some(node), width, move |_, _| {
            second_log.borrow_mut().push("second");
        })
        .unwrap();

    manager.set(node, width, 1.0).unwrap();
    manager.set(node, width, 2.0).unwrap();
    assert_eq!(*log.borrow(), ["first", "second", "second"]);
}

#[test]
fn removed_sibling_is_never_invoked_again() {
    let (mut manager, width, node) = setup();
    let victim_calls = Rc::new(Cell::new(0_u32));
    let target: Rc<Cell<Option<NotificationHandle>>> = Rc::new(Cell::new(None));

    let remover_target = target.clone();
    manager
        .add_notification_handler(None, width, move |manager, _| {
            if let Some(handle) = remover_target.take() {
                manager.remove_notification_handler(None, width, handle);
            }
        })
        .unwrap();
    let calls = victim_calls.clone();
    let victim = manager
        .add_notification_handler(None, width, move |_, _| calls.set(calls.get() + 1))
        .unwrap();
    target.set(Some(victim));

    manager.set(node, width, 1.0).unwrap();
    manager.set(node, width, 2.0).unwrap();
    assert_eq!(victim_calls.get(), 0);
}

#[test]
fn handler_added_during_dispatch_runs_from_the_next_change() {
    let (mut manager, width, node) = setup();
    let late_calls = Rc::new(Cell::new(0_u32));
    let added = Rc::new(Cell::new(false));

    let (calls, done) = (late_calls.clone(), added.clone());
    manager
        .add_notification_handler(Some(node), width, move |manager, _| {
            if !done.replace(true) {
                let calls = calls.clone();
                manager
                    .add_notification_handler(Some(node), width, move |_, _| {
                        calls.set(calls.get() + 1);
                    })
                    .unwrap();
            }
        })
        .unwrap();

    manager.set(node, width, 1.0).unwrap();
    assert_eq!(late_calls.get(), 0);
    manager.set(node, width, 2.0).unwrap();
    assert_eq!(late_calls.get(), 1);
}

#[test]
fn handlers_may_change_other_properties() {
    let (mut manager, width, node) = setup();
    let actual = manager
        .register(PropertyTypeBuilder::new("ActualWidth", 0.0_f32).read_only(true))
        .unwrap();
    let height = manager
        .register(PropertyTypeBuilder::new("Height", 0.0_f32))
        .unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));

    manager
        .add_notification_handler(Some(node), width, move |manager, change| {
            if let Some(PropertyValue::Float(w)) = change.value {
                manager.set(change.object, height, w * 2.0).unwrap();
            }
        })
        .unwrap();
    let heights = seen.clone();
    manager
        .add_notification_handler(None, height, move |manager, change| {
            heights.borrow_mut().push(change.value.clone());
            // The width change is committed before its handlers run.
            assert_eq!(manager.get(change.object, width).unwrap(), Some(4.0));
        })
        .unwrap();

    manager.set(node, width, 4.0).unwrap();
    assert_eq!(manager.get(node, height).unwrap(), Some(8.0));
    assert_eq!(*seen.borrow(), [Some(PropertyValue::Float(8.0))]);
    assert!(manager.set(node, actual, 1.0).is_err());
}

#[test]
fn handler_tearing_down_its_object_is_safe() {
    let (mut manager, width, node) = setup();
    let after = Rc::new(Cell::new(0_u32));
    manager
        .add_notification_handler(Some(node), width, |manager, change| {
            manager.remove_object_properties(change.object);
        })
        .unwrap();
    let calls = after.clone();
    manager
        .add_notification_handler(Some(node), width, move |_, _| calls.set(calls.get() + 1))
        .unwrap();

    manager.set(node, width, 1.0).unwrap();
    assert_eq!(after.get(), 0);
    assert!(!manager.has_storage(node, width));
    assert_eq!(manager.get(node, width).unwrap(), None);
}
