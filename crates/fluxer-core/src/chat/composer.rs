//! Compose box state and the single-flight send gate.

use super::events::SendOutcome;

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Composer {
    pub(crate) input: String,
    pub(crate) sending: bool,
    pub(crate) send_error: Option<String>,
}

impl Composer {
    /// Edits are refused while a send is in flight
    pub(crate) fn set_input(&mut self, text: String) -> bool {
        if self.sending {
            return false;
        }
        self.input = text;
        true
    }

    /// Take the input for a text send and close the gate
    pub(crate) fn begin_text(&mut self) -> Result<String, SendOutcome> {
        if self.sending {
            return Err(SendOutcome::Busy);
        }
        if self.input.trim().is_empty() {
            return Err(SendOutcome::Empty);
        }
        Ok(self.begin())
    }

    /// Take the input as an image caption; an empty caption is fine
    pub(crate) fn begin_image(&mut self) -> Result<String, SendOutcome> {
        if self.sending {
            return Err(SendOutcome::Busy);
        }
        Ok(self.begin())
    }

    fn begin(&mut self) -> String {
        self.sending = true;
        self.send_error = None;
        std::mem::take(&mut self.input)
    }

    pub(crate) fn succeed(&mut self) {
        self.sending = false;
    }

    /// Reopen the gate after a failure, putting `restore` back into the input
    pub(crate) fn fail(&mut self, error: String, restore: Option<String>) -> Option<String> {
        self.sending = false;
        self.send_error = Some(error);
        if let Some(text) = &restore {
            self.input = text.clone();
        }
        restore
    }
}
