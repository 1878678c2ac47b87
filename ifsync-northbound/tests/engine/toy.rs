//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Minimal provider reconciling `/toy:widgets/widget` entries against an
// in-memory object store.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock as Lazy, Mutex};

use ifsync_northbound::ProviderBase;
use ifsync_northbound::configuration::{
    FieldKind, HandlerArgs, Handlers, HandlersBuilder, Provider, Resolution,
};
use ifsync_northbound::error::Error;

pub const ROOT: &str = "/toy:widgets/widget";

static HANDLERS: Lazy<Handlers<Toy>> = Lazy::new(load_handlers);

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Widget {
    pub color: String,
    pub parts: BTreeMap<String, u32>,
    // Widget that can't be adopted by a create.
    pub foreign: bool,
}

#[derive(Debug, Default)]
pub struct Store {
    pub widgets: BTreeMap<String, Widget>,
    pub calls: Vec<String>,
    pub fail_open: bool,
    pub sessions_open: usize,
    pub sessions_total: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Toy {
    pub store: Arc<Mutex<Store>>,
}

pub struct ToySession {
    store: Arc<Mutex<Store>>,
}

// ===== impl Toy =====

impl Toy {
    pub fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

impl ProviderBase for Toy {
    fn top_level_node(&self) -> String {
        ROOT.to_owned()
    }
}

impl Provider for Toy {
    type Session = ToySession;

    fn handlers() -> &'static Handlers<Toy> {
        &HANDLERS
    }

    fn open_session(&mut self) -> Result<ToySession, Error> {
        let mut store = self.store();
        if store.fail_open {
            return Err(Error::SessionInit("store unavailable".to_owned()));
        }
        store.sessions_open += 1;
        store.sessions_total += 1;
        Ok(ToySession {
            store: self.store.clone(),
        })
    }
}

// ===== impl ToySession =====

impl ToySession {
    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

impl Drop for ToySession {
    fn drop(&mut self) {
        self.store().sessions_open -= 1;
    }
}

// ===== handlers =====

fn widget_name(args: &HandlerArgs<'_>) -> String {
    args.key("widget", "name").unwrap().to_owned()
}

fn load_handlers() -> Handlers<Toy> {
    HandlersBuilder::<Toy>::default()
        .path("name")
        .kind(FieldKind::Identity)
        .validate(|change| {
            let name = change.value.as_deref().unwrap_or_default();
            if name.len() > 5 {
                return Err(Error::InvalidArgument(name.to_owned()));
            }
            Ok(())
        })
        .resolve(|session, args| {
            let name = args.value()?;
            let store = session.store();
            Ok(match store.widgets.get(name) {
                None => Resolution::Absent,
                Some(widget) if widget.foreign => Resolution::Differs,
                Some(_) => Resolution::Unchanged,
            })
        })
        .create(|session, args| {
            let name = args.value()?.to_owned();
            let color = args
                .aggregate("color", "color")
                .unwrap_or("white")
                .to_owned();
            let mut store = session.store();
            store.calls.push(format!("create {name} {color}"));
            store.widgets.insert(
                name,
                Widget {
                    color,
                    ..Default::default()
                },
            );
            Ok(())
        })
        .delete(|session, args| {
            let name = args.value()?.to_owned();
            let mut store = session.store();
            store.calls.push(format!("delete {name}"));
            store.widgets.remove(&name);
            Ok(())
        })
        .path("color")
        .validate(|change| match change.value.as_deref() {
            Some("red" | "green" | "blue" | "white") => Ok(()),
            value => Err(Error::InvalidArgument(format!("{value:?}"))),
        })
        .resolve(|session, args| {
            let name = widget_name(args);
            let store = session.store();
            let Some(widget) = store.widgets.get(&name) else {
                return Ok(Resolution::ParentMissing);
            };
            if args.change.value.as_deref() == Some(widget.color.as_str()) {
                return Ok(Resolution::Unchanged);
            }
            Ok(Resolution::Differs)
        })
        .create(set_color)
        .modify(set_color)
        .delete(|session, args| {
            let name = widget_name(args);
            let mut store = session.store();
            store.calls.push(format!("color {name} white"));
            if let Some(widget) = store.widgets.get_mut(&name) {
                widget.color = "white".to_owned();
            }
            Ok(())
        })
        .path("part/id")
        .kind(FieldKind::Identity)
        .resolve(|session, args| {
            let name = widget_name(args);
            let id = args.value()?;
            let store = session.store();
            let Some(widget) = store.widgets.get(&name) else {
                return Ok(Resolution::ParentMissing);
            };
            match widget.parts.contains_key(id) {
                true => Ok(Resolution::Unchanged),
                false => Ok(Resolution::Absent),
            }
        })
        .create(|session, args| {
            let name = widget_name(args);
            let id = args.value()?.to_owned();
            args.aggregate("size", "size");
            let size = args
                .require("size")?
                .parse::<u32>()
                .map_err(|error| Error::InvalidArgument(error.to_string()))?;
            let mut store = session.store();
            store.calls.push(format!("part {name} {id} {size}"));
            if let Some(widget) = store.widgets.get_mut(&name) {
                widget.parts.insert(id, size);
            }
            Ok(())
        })
        .delete(|session, args| {
            let name = widget_name(args);
            let id = args.value()?.to_owned();
            let mut store = session.store();
            store.calls.push(format!("unpart {name} {id}"));
            if let Some(widget) = store.widgets.get_mut(&name) {
                widget.parts.remove(&id);
            }
            Ok(())
        })
        .build()
}

fn set_color(
    session: &mut ToySession,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let name = widget_name(args);
    let color = args.value()?.to_owned();
    let mut store = session.store();
    store.calls.push(format!("color {name} {color}"));
    if let Some(widget) = store.widgets.get_mut(&name) {
        widget.color = color;
    }
    Ok(())
}

// ===== path helpers =====

pub fn widget(name: &str) -> String {
    format!("{ROOT}[name='{name}']")
}

pub fn leaf(name: &str, leaf: &str) -> String {
    format!("{}/{leaf}", widget(name))
}

pub fn part(name: &str, id: &str, leaf: &str) -> String {
    format!("{}/part[id='{id}']/{leaf}", widget(name))
}
