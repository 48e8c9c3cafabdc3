//! Front panel state and key handling.

use crate::asm::disasm::disassemble_instruction;
use crate::cpu::{Core, CpuSnapshot};
use crate::driver::{DriverError, Machine};

/// Front panel application state.
pub struct PanelApp {
    /// The machine being displayed.
    pub machine: Machine,
    /// Input port value driven by the panel switches.
    pub input: u8,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
}

impl PanelApp {
    pub fn new(core: Core, cycle_ms: u64) -> Self {
        let mut machine = Machine::new(core);
        machine.set_cycle(cycle_ms);
        Self {
            machine,
            input: 0,
            should_quit: false,
            status: "Ready. Press 'r' to run, 's' to step, 'q' to quit.".into(),
        }
    }

    pub fn start(&mut self) {
        if self.machine.is_running() {
            return;
        }
        self.status = match self.machine.run() {
            Ok(()) => format!("Running at {} steps/s", self.machine.ticks_per_second()),
            Err(e) => format!("Error: {}", e),
        };
    }

    pub fn stop(&mut self) {
        self.machine.stop();
        self.status = "Stopped.".into();
    }

    pub fn step(&mut self) {
        self.machine.stop();
        self.status = match self.machine.step() {
            Ok(true) => self.describe_last(),
            Ok(false) => "Program finished; PC rewound to 00.".into(),
            Err(e) => format!("Error: {}. Press 'x' to reset.", e),
        };
    }

    pub fn reset(&mut self) {
        self.status = match self.machine.reset() {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Error: {}", e),
        };
        self.input = 0;
    }

    /// Toggle one bit of the input switches.
    pub fn toggle_input_bit(&mut self, bit: u8) {
        self.input ^= 1 << bit;
        if let Err(e) = self.machine.set_input(self.input) {
            self.status = format!("Error: {}", e);
        }
    }

    /// Called once per UI frame to pick up driver completion or faults.
    pub fn tick(&mut self) {
        if self.machine.is_running() {
            return;
        }
        if let Some(e) = self.machine.last_error() {
            self.status = format!("Faulted: {}. Press 'x' to reset.", e);
        }
    }

    pub fn snapshot(&self) -> Result<CpuSnapshot, DriverError> {
        self.machine.snapshot()
    }

    /// ROM listing as (address, text, is_current) rows.
    pub fn listing(&self) -> Vec<(usize, String, bool)> {
        self.machine
            .with_core(|core| {
                let pc = usize::from(core.pc());
                core.rom()
                    .as_bytes()
                    .iter()
                    .enumerate()
                    .map(|(addr, byte)| (addr, disassemble_instruction(*byte), addr == pc))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn describe_last(&self) -> String {
        match self.snapshot() {
            Ok(snap) => format!(
                "Stepped: {} -> PC={:02}",
                disassemble_instruction(snap.instruction),
                snap.pc
            ),
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// Run the front panel for a core.
pub fn run_panel(core: Core, cycle_ms: u64) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = PanelApp::new(core, cycle_ms);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(30))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('r') => app.start(),
                        KeyCode::Char('p') | KeyCode::Char(' ') => app.stop(),
                        KeyCode::Char('s') => app.step(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char(c @ '0'..='3') => app.toggle_input_bit(c as u8 - b'0'),
                        _ => {}
                    }
                }
            }
        }

        app.tick();

        if app.should_quit {
            break;
        }
    }

    app.machine.stop();
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_step_and_reset() {
        let mut app = PanelApp::new(Core::new(), 5);
        app.step();
        assert!(app.status.starts_with("Stepped: OUT 0111"));
        assert_eq!(app.snapshot().unwrap().pc, 1);
        app.reset();
        assert_eq!(app.snapshot().unwrap().pc, 0);
    }

    #[test]
    fn test_panel_input_switches() {
        let mut app = PanelApp::new(Core::new(), 5);
        app.toggle_input_bit(0);
        app.toggle_input_bit(3);
        assert_eq!(app.snapshot().unwrap().input, 0b1001);
        app.toggle_input_bit(3);
        assert_eq!(app.snapshot().unwrap().input, 0b0001);
    }

    #[test]
    fn test_panel_listing_marks_pc() {
        let app = PanelApp::new(Core::new(), 5);
        let rows = app.listing();
        assert_eq!(rows.len(), 16);
        assert!(rows[0].2);
        assert_eq!(rows[15].1, "JMP 1111");
    }
}
