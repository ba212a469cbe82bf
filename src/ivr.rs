//! Dialog engine for the clinic IVR
//!
//! Pure evaluation of caller input against the menu script, in the same
//! shape as an Elm-style update: `(state, input) -> (instructions, state)`.
//! All call state travels in the callback address; nothing is retained
//! between webhooks.

mod codec;
mod engine;
mod input;
mod instruction;
mod state;

#[cfg(test)]
mod proptests;

pub use codec::StateCodec;
pub use engine::{DialogEngine, Evaluation};
pub use input::DialInput;
pub use instruction::Instruction;
pub use state::{DialState, Selection};

#[cfg(test)]
pub(crate) fn clinic_engine() -> DialogEngine {
    use crate::locale::LocaleTable;
    use crate::menu::{MenuScript, MenuSettings};
    use std::sync::Arc;

    DialogEngine::new(
        Arc::new(MenuScript::clinic(&MenuSettings::default())),
        Arc::new(LocaleTable::builtin("en").unwrap()),
    )
    .unwrap()
}
