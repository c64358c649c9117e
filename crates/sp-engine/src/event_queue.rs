//! Per-track pending work, serviced once per quantum by `TrackPlayer::step`.

/// A reset waiting to be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetRequest {
    pub clear_gates: bool,
    pub reset_sections: bool,
}

/// Pending track commands.
///
/// Written only by the player's own thread: commands from the editor arrive
/// through the mailbox and are copied in here during `Player::step`.
#[derive(Debug, Default)]
pub struct EventQueue {
    /// 1-based section waiting to play next; 0 = none
    next_section: usize,
    /// The request was made while stopped
    set_while_stopped: bool,
    /// The request should cut in now rather than at the section end
    apply_immediately: bool,
    reset: Option<ResetRequest>,
    /// Playback has not been positioned yet
    startup: bool,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { startup: true, ..Self::default() }
    }

    pub fn next_section(&self) -> usize {
        self.next_section
    }

    /// Queue a section. 0 clears any pending request.
    pub fn request_section(&mut self, section: usize, while_stopped: bool, immediately: bool) {
        self.next_section = section;
        if section == 0 {
            self.set_while_stopped = false;
            self.apply_immediately = false;
        } else {
            self.set_while_stopped = while_stopped;
            self.apply_immediately = immediately;
        }
    }

    pub fn set_while_stopped(&self) -> bool {
        self.set_while_stopped
    }

    pub fn apply_immediately(&self) -> bool {
        self.apply_immediately
    }

    /// Take the pending section request, clearing its flags.
    pub fn take_section(&mut self) -> Option<usize> {
        let section = core::mem::take(&mut self.next_section);
        self.set_while_stopped = false;
        self.apply_immediately = false;
        (section != 0).then_some(section)
    }

    /// Queue a reset. Repeated requests merge: any request to clear gates or
    /// rewind sections sticks until serviced.
    pub fn request_reset(&mut self, clear_gates: bool, reset_sections: bool) {
        let merged = match self.reset {
            Some(r) => ResetRequest {
                clear_gates: r.clear_gates || clear_gates,
                reset_sections: r.reset_sections || reset_sections,
            },
            None => ResetRequest { clear_gates, reset_sections },
        };
        self.reset = Some(merged);
    }

    pub fn take_reset(&mut self) -> Option<ResetRequest> {
        self.reset.take()
    }

    pub fn startup(&self) -> bool {
        self.startup
    }

    pub fn finish_startup(&mut self) {
        self.startup = false;
    }
}
