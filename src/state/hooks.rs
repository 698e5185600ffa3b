//! Admission hooks.
//!
//! Extensions veto or force decisions at fixed points: connection
//! admission, invite permission, invite-only bypass and STATS. Hooks run
//! in registration order and the first answer other than
//! [`ModResult::Passthrough`] is final; if every hook passes, the caller
//! applies its default policy.

use std::fmt;
use std::sync::Arc;

use crate::matching::match_cidr;
use crate::message::Response;
use crate::state::{Channel, User};

/// Verdict of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModResult {
    Allow,
    Deny,
    Passthrough,
}

/// Rows a hook produces for a STATS symbol it takes over.
pub type StatsRows = Vec<(Response, Vec<String>)>;

/// Observer of admission decisions. Every method defaults to
/// [`ModResult::Passthrough`].
pub trait AdmissionHook: Send + Sync {
    fn name(&self) -> &'static str;

    /// A local connection has been accepted. `Deny` disconnects it.
    fn on_user_register(&self, _user: &User) -> ModResult {
        ModResult::Passthrough
    }

    /// `source` wants to invite `target` to `channel`. `Deny` aborts the
    /// invite; `Allow` skips the rank check.
    fn on_user_pre_invite(&self, _source: &User, _target: &User, _channel: &Channel) -> ModResult {
        ModResult::Passthrough
    }

    /// `user` is joining invite-only `channel` without an invite.
    /// `Allow` lets them in.
    fn on_check_invite(&self, _user: &User, _channel: &Channel) -> ModResult {
        ModResult::Passthrough
    }

    /// `source` requested STATS `symbol`. Anything but `Passthrough` means
    /// the hook answered with `rows`.
    fn on_stats(&self, _symbol: char, _source: &User, _rows: &mut StatsRows) -> ModResult {
        ModResult::Passthrough
    }
}

/// Ordered list of hooks.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn AdmissionHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|hook| hook.name()))
            .finish()
    }
}

impl HookRegistry {
    /// A registry holding the built-in hooks.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(InviteExceptionHook));
        registry
    }

    pub fn register(&mut self, hook: Arc<dyn AdmissionHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn first(&self, mut ask: impl FnMut(&dyn AdmissionHook) -> ModResult) -> ModResult {
        self.hooks
            .iter()
            .map(|hook| ask(hook.as_ref()))
            .find(|result| *result != ModResult::Passthrough)
            .unwrap_or(ModResult::Passthrough)
    }

    pub fn user_register(&self, user: &User) -> ModResult {
        self.first(|hook| hook.on_user_register(user))
    }

    pub fn user_pre_invite(&self, source: &User, target: &User, channel: &Channel) -> ModResult {
        self.first(|hook| hook.on_user_pre_invite(source, target, channel))
    }

    pub fn check_invite(&self, user: &User, channel: &Channel) -> ModResult {
        self.first(|hook| hook.on_check_invite(user, channel))
    }

    pub fn stats(&self, symbol: char, source: &User, rows: &mut StatsRows) -> ModResult {
        self.first(|hook| hook.on_stats(symbol, source, rows))
    }
}

/// Channel invite exceptions (+I): a matching user joins +i channels
/// without an invite.
#[derive(Debug, Clone, Copy, Default)]
pub struct InviteExceptionHook;

impl AdmissionHook for InviteExceptionHook {
    fn name(&self) -> &'static str {
        "invite-exception"
    }

    fn on_check_invite(&self, user: &User, channel: &Channel) -> ModResult {
        let nick = user.nick_or_star();
        let forms = [
            format!("{nick}!{}", user.user_host()),
            format!("{nick}!{}@{}", user.ident, user.host),
            format!("{nick}!{}", user.user_ip()),
        ];
        let excepted = channel
            .invex
            .iter()
            .any(|mask| forms.iter().any(|form| match_cidr(form, mask)));
        if excepted {
            ModResult::Allow
        } else {
            ModResult::Passthrough
        }
    }
}
