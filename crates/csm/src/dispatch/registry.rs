use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

use crate::command::{Command, CommandKind, DecodeError, Envelope};
use crate::handler::{self, Context, Handler, HandlerError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a handler for {0:?} is already registered")]
    DuplicateRegistration(CommandKind),
}

/// A decoded command bound to its handler, ready to run.
pub type Pending = Box<dyn FnOnce(&Context<'_>) -> Result<(), HandlerError> + Send>;

trait Entry: Send + Sync {
    fn decode(&self, envelope: &Envelope) -> Result<Pending, DecodeError>;
}

struct TypedEntry<C, H> {
    handler: Arc<H>,
    _command: PhantomData<fn() -> C>,
}

impl<C, H> Entry for TypedEntry<C, H>
where
    C: Command,
    H: Handler<C>,
{
    fn decode(&self, envelope: &Envelope) -> Result<Pending, DecodeError> {
        let command = C::from_envelope(envelope)?;
        let handler = Arc::clone(&self.handler);
        Ok(Box::new(move |ctx: &Context<'_>| handler.handle(command, ctx)))
    }
}

/// Maps each command kind to the handler that decodes and runs it.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<CommandKind, Box<dyn Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in handler of every catalog command.
    pub fn with_default_handlers() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        handler::register_defaults(&mut registry)?;
        Ok(registry)
    }

    pub fn register<C, H>(&mut self, handler: H) -> Result<(), RegistryError>
    where
        C: Command,
        H: Handler<C>,
    {
        if self.entries.contains_key(&C::KIND) {
            return Err(RegistryError::DuplicateRegistration(C::KIND));
        }
        self.entries.insert(
            C::KIND,
            Box::new(TypedEntry {
                handler: Arc::new(handler),
                _command: PhantomData::<fn() -> C>,
            }),
        );
        Ok(())
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = CommandKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` when nothing is registered for `kind`.
    pub(crate) fn decode(
        &self,
        kind: CommandKind,
        envelope: &Envelope,
    ) -> Option<Result<Pending, DecodeError>> {
        self.entries.get(&kind).map(|entry| entry.decode(envelope))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ChatMessageCommand;

    fn ignore_chat(_: ChatMessageCommand, _: &Context<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn default_handlers_cover_catalog() {
        let registry = Registry::with_default_handlers().unwrap();
        assert_eq!(registry.len(), CommandKind::ALL.len());
        for kind in CommandKind::ALL {
            assert!(registry.contains(kind), "{kind:?} has no handler");
        }
    }

    #[test]
    fn second_registration_is_refused() {
        let mut registry = Registry::new();
        registry
            .register::<ChatMessageCommand, _>(ignore_chat)
            .unwrap();

        let err = registry
            .register::<ChatMessageCommand, _>(|_: ChatMessageCommand, _: &Context<'_>| {
                Ok::<(), HandlerError>(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateRegistration(CommandKind::ChatMessage)
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn decode_reports_payload_errors() {
        let registry = Registry::with_default_handlers().unwrap();
        let envelope = Envelope::new(CommandKind::ChatMessage.id(), None, Vec::new());

        let result = registry.decode(CommandKind::ChatMessage, &envelope);
        assert!(matches!(result, Some(Err(DecodeError::MissingField { .. }))));
        assert!(Registry::new().decode(CommandKind::ChatMessage, &envelope).is_none());
    }
}
