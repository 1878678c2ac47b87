//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use ifsync_utils::xpath;
use serde::{Deserialize, Serialize};

use crate::ProviderBase;
use crate::aggregator::FieldAggregator;
use crate::change::{ChangeOp, ChangeRecord, ChangeSource};
use crate::debug::Debug;
use crate::error::Error;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum CommitPhase {
    Verify,
    Apply,
    Abort,
}

// Role of a field within its kernel object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    // Field that identifies the kernel object (e.g. interface name, address).
    Identity,
    // Field that describes an attribute of an existing kernel object.
    Attribute,
}

// Kernel truth for the object a change record refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    Absent,
    Unchanged,
    Differs,
    ParentMissing,
}

// Result of reconciling one change record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Applied,
    NoOp,
    Failed(Error),
}

//
// Field handlers.
//

pub struct Handlers<P: Provider>(Vec<Handler<P>>);

pub struct Handler<P: Provider> {
    pub path: &'static str,
    pub kind: FieldKind,
    pub validate: Option<CallbackValidate>,
    pub resolve: Option<CallbackResolve<P>>,
    pub create: Option<CallbackApply<P>>,
    pub modify: Option<CallbackApply<P>>,
    pub delete: Option<CallbackApply<P>>,
}

pub struct HandlersBuilder<P: Provider> {
    handler: Option<Handler<P>>,
    handlers: Handlers<P>,
}

pub struct HandlerArgs<'a> {
    pub instance: &'a str,
    pub change: &'a ChangeRecord,
    pub changes: &'a dyn ChangeSource,
    pub aggregator: &'a mut FieldAggregator,
}

//
// Reports.
//

#[derive(Clone, Debug, Eq, new, PartialEq)]
pub struct RecordReport {
    pub path: String,
    pub operation: ChangeOp,
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceReport {
    pub instance: String,
    pub records: Vec<RecordReport>,
    // Error that aborted the instance.
    pub fatal: Option<Error>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitReport {
    pub phase: CommitPhase,
    pub instances: Vec<InstanceReport>,
}

//
// Useful type definition(s).
//

pub type CallbackValidate = fn(&ChangeRecord) -> Result<(), Error>;

pub type CallbackResolve<P: Provider> =
    fn(&mut P::Session, &mut HandlerArgs<'_>) -> Result<Resolution, Error>;

pub type CallbackApply<P: Provider> =
    fn(&mut P::Session, &mut HandlerArgs<'_>) -> Result<(), Error>;

//
// Provider northbound.
//

pub trait Provider: ProviderBase {
    // Kernel session, opened once per instance and released when dropped.
    type Session;

    fn handlers() -> &'static Handlers<Self>;

    fn open_session(&mut self) -> Result<Self::Session, Error>;

    fn close_session(&mut self, _session: Self::Session) {}
}

// ===== impl Outcome =====

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::NoOp => write!(f, "no-op"),
            Outcome::Failed(error) => {
                write!(f, "failed: {} ({})", error, error.reason())
            }
        }
    }
}

// ===== impl Handlers =====

impl<P> Handlers<P>
where
    P: Provider,
{
    // Returns the handlers in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Handler<P>> {
        self.0.iter()
    }

    pub fn paths(&self) -> Vec<&'static str> {
        self.0.iter().map(|handler| handler.path).collect()
    }
}

impl<P> std::fmt::Debug for Handlers<P>
where
    P: Provider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handlers({:?})", self.paths())
    }
}

impl<P> Default for Handlers<P>
where
    P: Provider,
{
    fn default() -> Self {
        Handlers(Vec::new())
    }
}

// ===== impl Handler =====

impl<P> Handler<P>
where
    P: Provider,
{
    fn new(path: &'static str) -> Self {
        Handler {
            path,
            kind: FieldKind::Attribute,
            validate: None,
            resolve: None,
            create: None,
            modify: None,
            delete: None,
        }
    }
}

// ===== impl HandlersBuilder =====

impl<P> HandlersBuilder<P>
where
    P: Provider,
{
    // Starts the registration of a handler for the given path, relative to
    // the instance root. Handlers are dispatched in registration order.
    #[must_use]
    pub fn path(mut self, path: &'static str) -> Self {
        if let Some(handler) = self.handler.replace(Handler::new(path)) {
            self.handlers.0.push(handler);
        }
        self
    }

    #[must_use]
    fn update(mut self, f: impl FnOnce(&mut Handler<P>)) -> Self {
        if let Some(handler) = &mut self.handler {
            f(handler);
        }
        self
    }

    #[must_use]
    pub fn kind(self, kind: FieldKind) -> Self {
        self.update(|handler| handler.kind = kind)
    }

    #[must_use]
    pub fn validate(self, cb: CallbackValidate) -> Self {
        self.update(|handler| handler.validate = Some(cb))
    }

    #[must_use]
    pub fn resolve(self, cb: CallbackResolve<P>) -> Self {
        self.update(|handler| handler.resolve = Some(cb))
    }

    #[must_use]
    pub fn create(self, cb: CallbackApply<P>) -> Self {
        self.update(|handler| handler.create = Some(cb))
    }

    #[must_use]
    pub fn modify(self, cb: CallbackApply<P>) -> Self {
        self.update(|handler| handler.modify = Some(cb))
    }

    #[must_use]
    pub fn delete(self, cb: CallbackApply<P>) -> Self {
        self.update(|handler| handler.delete = Some(cb))
    }

    #[must_use]
    pub fn build(mut self) -> Handlers<P> {
        if let Some(handler) = self.handler.take() {
            self.handlers.0.push(handler);
        }
        self.handlers
    }
}

impl<P> Default for HandlersBuilder<P>
where
    P: Provider,
{
    fn default() -> Self {
        HandlersBuilder {
            handler: None,
            handlers: Handlers::default(),
        }
    }
}

// ===== impl HandlerArgs =====

impl HandlerArgs<'_> {
    // Returns the path of the object the current record belongs to.
    pub fn object(&self) -> &str {
        self.change.object_path()
    }

    // Returns the value of a list key found in the current record path.
    pub fn key(&self, list: &str, key: &str) -> Option<&str> {
        xpath::key_value(&self.change.path, list, key)
    }

    // Returns the record value, or the last known value for deletions.
    pub fn value(&self) -> Result<&str, Error> {
        self.change
            .effective_value()
            .ok_or_else(|| Error::MissingField(self.change.path.clone()))
    }

    // Looks up the sibling leaf of the current record in the transaction
    // and stores its value in the given slot.
    //
    // Deleted siblings contribute their last known value.
    pub fn aggregate(
        &mut self,
        slot: &'static str,
        leaf: &str,
    ) -> Option<&str> {
        let path = format!("{}/{}", self.change.object_path(), leaf);
        if let Some(value) = self
            .changes
            .find(&path)
            .and_then(ChangeRecord::effective_value)
        {
            self.aggregator.set(slot, value);
        }
        self.aggregator.get(slot)
    }

    pub fn require(&self, slot: &str) -> Result<&str, Error> {
        self.aggregator.require(slot)
    }
}

// ===== impl InstanceReport =====

impl InstanceReport {
    fn new(instance: &str) -> InstanceReport {
        InstanceReport {
            instance: instance.to_owned(),
            records: vec![],
            fatal: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn first_failure(&self) -> Option<&Error> {
        self.records
            .iter()
            .find_map(|record| match &record.outcome {
                Outcome::Failed(error) => Some(error),
                _ => None,
            })
            .or(self.fatal.as_ref())
    }

    // Returns the number of records that resulted in kernel changes.
    pub fn applied(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.outcome == Outcome::Applied)
            .count()
    }
}

// ===== impl CommitReport =====

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.instances.iter().all(InstanceReport::is_success)
    }

    pub fn first_failure(&self) -> Option<&Error> {
        self.instances
            .iter()
            .find_map(InstanceReport::first_failure)
    }

    pub fn instance(&self, instance: &str) -> Option<&InstanceReport> {
        let instance = xpath::normalize(instance);
        self.instances
            .iter()
            .find(|report| report.instance == instance)
    }

    // Converts the report into the host's pass/fail convention.
    pub fn into_result(self) -> Result<CommitReport, Error> {
        match self.first_failure() {
            Some(error) => Err(error.clone()),
            None => Ok(self),
        }
    }
}

// ===== helper functions =====

fn selector(instance: &str, handler_path: &str) -> String {
    format!("{instance}/{handler_path}")
}

fn validate_record(
    cb: Option<CallbackValidate>,
    change: &ChangeRecord,
) -> Result<(), Error> {
    match (cb, change.operation) {
        (Some(cb), ChangeOp::Created | ChangeOp::Modified) => (cb)(change),
        _ => Ok(()),
    }
}

fn verify_instance<P>(
    instance: &str,
    changes: &dyn ChangeSource,
) -> InstanceReport
where
    P: Provider,
{
    let mut report = InstanceReport::new(instance);

    for handler in P::handlers().iter() {
        let selector = selector(instance, handler.path);
        for change in changes.changes(&selector) {
            Debug::HandlerCallback(CommitPhase::Verify, change).log();

            let outcome = match validate_record(handler.validate, change) {
                Ok(()) => Outcome::NoOp,
                Err(error) => {
                    error.log();
                    if report.fatal.is_none() && error.is_fatal(handler.kind)
                    {
                        report.fatal = Some(error.clone());
                    }
                    Outcome::Failed(error)
                }
            };
            report.records.push(RecordReport::new(
                change.path.clone(),
                change.operation,
                outcome,
            ));
        }
    }

    report
}

fn process_record<P>(
    session: &mut P::Session,
    handler: &Handler<P>,
    instance: &str,
    change: &ChangeRecord,
    changes: &dyn ChangeSource,
    aggregator: &mut FieldAggregator,
) -> Result<Outcome, Error>
where
    P: Provider,
{
    // Reordering has no effect on kernel state.
    if change.operation == ChangeOp::Moved {
        return Ok(Outcome::NoOp);
    }

    // Reject malformed input before any kernel interaction.
    validate_record(handler.validate, change)?;

    aggregator.begin(change.object_path())?;
    let mut args = HandlerArgs {
        instance,
        change,
        changes,
        aggregator,
    };
    let result = process_transition(session, handler, &mut args);
    args.aggregator.end();

    result
}

fn process_transition<P>(
    session: &mut P::Session,
    handler: &Handler<P>,
    args: &mut HandlerArgs<'_>,
) -> Result<Outcome, Error>
where
    P: Provider,
{
    let change = args.change;
    let operation = change.operation;

    // Identity fields can't be changed in place.
    if operation == ChangeOp::Modified
        && handler.kind == FieldKind::Identity
        && handler.modify.is_none()
    {
        return Err(Error::UnsupportedTransition(
            operation,
            change.path.clone(),
        ));
    }

    // Fetch kernel truth.
    let resolution = match handler.resolve {
        Some(cb) => (cb)(session, args)?,
        None => Resolution::Differs,
    };

    let cb = match (operation, resolution) {
        (ChangeOp::Moved, _) => return Ok(Outcome::NoOp),
        (ChangeOp::Created | ChangeOp::Modified, Resolution::ParentMissing) => {
            return Err(Error::ParentNotFound(change.path.clone()));
        }
        (ChangeOp::Created | ChangeOp::Modified, Resolution::Unchanged) => {
            return Ok(Outcome::NoOp);
        }
        (ChangeOp::Created, Resolution::Absent) => handler.create,
        (ChangeOp::Created, Resolution::Differs) => match handler.kind {
            FieldKind::Identity => {
                return Err(Error::Conflict(change.path.clone()));
            }
            FieldKind::Attribute => handler.create,
        },
        (ChangeOp::Modified, _) => handler.modify,
        (ChangeOp::Deleted, Resolution::Absent | Resolution::ParentMissing) => {
            return Ok(Outcome::NoOp);
        }
        (ChangeOp::Deleted, _) => handler.delete,
    };

    match cb {
        Some(cb) => {
            (cb)(session, args)?;
            Ok(Outcome::Applied)
        }
        None => Ok(Outcome::NoOp),
    }
}

// ===== global functions =====

// Reconciles one instance against the kernel.
//
// Handlers run in their declared order. A failed record stops the remaining
// records of its handler, and fatal errors also stop the remaining handlers.
// Kernel changes already made are never rolled back.
pub fn process_instance<P>(
    provider: &mut P,
    instance: &str,
    changes: &dyn ChangeSource,
) -> InstanceReport
where
    P: Provider,
{
    let mut report = InstanceReport::new(instance);

    // Open kernel session.
    let mut session = match provider.open_session() {
        Ok(session) => session,
        Err(error) => {
            error.log();
            Debug::InstanceAbort(instance, &error).log();
            report.fatal = Some(error);
            return report;
        }
    };
    Debug::SessionOpen(instance).log();

    let mut aggregator = FieldAggregator::default();
    'handlers: for handler in P::handlers().iter() {
        let selector = selector(instance, handler.path);
        for change in changes.changes(&selector) {
            Debug::HandlerCallback(CommitPhase::Apply, change).log();

            let outcome = process_record(
                &mut session,
                handler,
                instance,
                change,
                changes,
                &mut aggregator,
            )
            .unwrap_or_else(Outcome::Failed);
            Debug::HandlerOutcome(&change.path, &outcome).log();
            report.records.push(RecordReport::new(
                change.path.clone(),
                change.operation,
                outcome.clone(),
            ));

            if let Outcome::Failed(error) = outcome {
                error.log();
                if error.is_fatal(handler.kind) {
                    Debug::InstanceAbort(instance, &error).log();
                    report.fatal = Some(error);
                    break 'handlers;
                }
                break;
            }
        }
    }

    // Release kernel session.
    provider.close_session(session);
    Debug::SessionClose(instance).log();

    report
}

// Processes one commit phase for every instance touched by the transaction.
pub fn process_commit<P>(
    provider: &mut P,
    phase: CommitPhase,
    changes: &dyn ChangeSource,
) -> CommitReport
where
    P: Provider,
{
    let mut reports = vec![];
    for root in provider.top_level_nodes() {
        let instances = changes.instances(&root);
        Debug::CommitStart(phase, &root, instances.len()).log();

        for instance in &instances {
            let report = match phase {
                CommitPhase::Verify => {
                    verify_instance::<P>(instance, changes)
                }
                CommitPhase::Apply => {
                    process_instance(provider, instance, changes)
                }
                CommitPhase::Abort => InstanceReport::new(instance),
            };
            reports.push(report);
        }
    }

    CommitReport {
        phase,
        instances: reports,
    }
}
