//! In-process terminal part.
//!
//! Records the started program and every input write, and echoes input back
//! as output. Used for headless hosts and in tests.
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::part::part_trait::{PartConfig, PartFactory, TerminalControl, TerminalError, TerminalPart};

#[derive(Debug, Default)]
struct MemoryState {
    program: Option<String>,
    args: Vec<String>,
    inputs: Vec<String>,
    output: Vec<u8>,
    running: bool,
}

/// Control interface of a [`MemoryPart`]
#[derive(Debug, Default)]
pub struct MemoryTerminal {
    state: RefCell<MemoryState>,
}

impl MemoryTerminal {
    /// Program passed to `start_program`, if any
    pub fn program(&self) -> Option<String> {
        self.state.borrow().program.clone()
    }

    pub fn args(&self) -> Vec<String> {
        self.state.borrow().args.clone()
    }

    /// Every `send_input` payload, in order
    pub fn inputs(&self) -> Vec<String> {
        self.state.borrow().inputs.clone()
    }

    /// All input concatenated as the program would read it
    pub fn input_text(&self) -> String {
        self.state.borrow().inputs.concat()
    }

    /// Simulate the program exiting
    pub fn exit(&self) {
        self.state.borrow_mut().running = false;
    }
}

impl TerminalControl for MemoryTerminal {
    fn start_program(&self, program: &str, args: &[String]) -> Result<(), TerminalError> {
        let mut state = self.state.borrow_mut();
        if state.running {
            return Err(TerminalError::AlreadyStarted);
        }

        info!("MemoryPart: Starting {:?} with args {:?}", program, args);
        state.program = Some(program.to_string());
        state.args = args.to_vec();
        state.running = true;
        Ok(())
    }

    fn send_input(&self, text: &str) -> Result<(), TerminalError> {
        let mut state = self.state.borrow_mut();
        if !state.running {
            return Err(TerminalError::NotStarted);
        }

        debug!("MemoryPart: Input {:?}", text);
        state.inputs.push(text.to_string());
        state.output.extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn drain_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.borrow_mut().output)
    }

    fn is_running(&self) -> bool {
        self.state.borrow().running
    }
}

/// Terminal part backed by a [`MemoryTerminal`]
pub struct MemoryPart {
    control: Option<Rc<MemoryTerminal>>,
}

impl TerminalPart for MemoryPart {
    fn control(&self) -> Option<Rc<dyn TerminalControl>> {
        self.control
            .as_ref()
            .map(|control| Rc::clone(control) as Rc<dyn TerminalControl>)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ================ 工厂实现 ================

/// Factory for [`MemoryPart`]s.
///
/// Clones share a journal of the terminals they created, so a caller can
/// keep one clone for inspection after handing another to a loader.
#[derive(Clone)]
pub struct MemoryPartFactory {
    with_control: bool,
    /// Live terminals only; dead entries are pruned on `create`
    created: Rc<RefCell<Vec<Weak<MemoryTerminal>>>>,
    created_total: Rc<Cell<usize>>,
}

impl Default for MemoryPartFactory {
    fn default() -> Self {
        Self {
            with_control: true,
            created: Rc::new(RefCell::new(Vec::new())),
            created_total: Rc::new(Cell::new(0)),
        }
    }
}

impl MemoryPartFactory {
    /// A factory whose parts expose no control interface
    pub fn without_control() -> Self {
        Self {
            with_control: false,
            ..Self::default()
        }
    }

    /// Terminals created so far that are still alive, oldest first
    pub fn terminals(&self) -> Vec<Rc<MemoryTerminal>> {
        self.created
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Number of parts ever created, alive or not
    pub fn created_count(&self) -> usize {
        self.created_total.get()
    }
}

impl PartFactory for MemoryPartFactory {
    fn create(&self, _config: &PartConfig) -> Result<Box<dyn TerminalPart>, TerminalError> {
        let control = Rc::new(MemoryTerminal::default());
        let mut created = self.created.borrow_mut();
        created.retain(|terminal| terminal.strong_count() > 0);
        created.push(Rc::downgrade(&control));
        self.created_total.set(self.created_total.get() + 1);

        Ok(Box::new(MemoryPart {
            control: self.with_control.then_some(control),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
