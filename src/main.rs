//! TD4 Emulator - CLI Entry Point
//!
//! Commands:
//! - `td4-emu run` - Step the built-in program to completion
//! - `td4-emu drive` - Run the built-in program on the timed driver
//! - `td4-emu debug` - Interactive front panel
//! - `td4-emu disasm` - Disassemble the built-in ROM
//! - `td4-emu test` - Built-in self-test

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "td4-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the TD4 4-bit educational CPU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Step the built-in program until it finishes
    Run {
        /// Maximum number of steps to run
        #[arg(short, long, default_value = "10000")]
        max_steps: u64,
        /// Delay between steps in milliseconds (0 runs flat out)
        #[arg(short, long, default_value = "0")]
        cycle_ms: u64,
        /// Value driven onto the input port
        #[arg(short, long, default_value = "0")]
        input: u8,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the built-in program on the background driver
    Drive {
        /// Delay between steps in milliseconds
        #[arg(short, long, default_value_t = td4::DEFAULT_CYCLE_MS)]
        cycle_ms: u64,
        /// Give up after this many milliseconds
        #[arg(long, default_value = "10000")]
        timeout_ms: u64,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive front panel
    #[cfg(feature = "tui")]
    Debug {
        /// Delay between steps in milliseconds
        #[arg(short, long, default_value = "200")]
        cycle_ms: u64,
    },
    /// Disassemble the built-in ROM
    Disasm,
    /// Run the built-in self-test
    Test,
}

fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { max_steps, cycle_ms, input, trace, json }) => {
            init_logging("info");
            run_program(max_steps, cycle_ms, input, trace, json);
        }
        Some(Commands::Drive { cycle_ms, timeout_ms, json }) => {
            init_logging("info");
            drive_program(cycle_ms, timeout_ms, json);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Debug { cycle_ms }) => {
            // Log lines would tear the alternate screen.
            init_logging("off");
            if let Err(e) = td4::run_panel(td4::Core::new(), cycle_ms) {
                eprintln!("❌ Front panel error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Disasm) => {
            print!("{}", td4::disassemble(&td4::RAMEN_TIMER));
        }
        Some(Commands::Test) => {
            init_logging("warn");
            run_self_test();
        }
        None => {
            println!("TD4 Emulator v0.1.0");
            println!("A 4-bit educational CPU emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn run_program(max_steps: u64, cycle_ms: u64, input: u8, trace: bool, json: bool) {
    use td4::{disassemble_instruction, Core};

    let mut core = Core::new();
    if let Err(e) = core.set_input(input) {
        error!("{}", e);
        std::process::exit(1);
    }

    let mut steps = 0u64;
    let mut finished = false;
    while steps < max_steps {
        let pc = core.pc();
        let byte = core.rom().read(usize::from(pc)).unwrap_or_default();

        match core.step() {
            Ok(cont) => {
                steps += 1;
                if trace {
                    let snap = core.snapshot();
                    println!(
                        "{:02}: {:<10} A={:2} B={:2} C={} LED={:04b}",
                        pc,
                        disassemble_instruction(byte),
                        snap.a,
                        snap.b,
                        u8::from(snap.carry),
                        snap.led
                    );
                }
                if !cont {
                    finished = true;
                    break;
                }
            }
            Err(e) => {
                error!("CPU error at PC={}: {}", pc, e);
                std::process::exit(1);
            }
        }

        if cycle_ms > 0 {
            std::thread::sleep(Duration::from_millis(cycle_ms));
        }
    }

    report(&core.snapshot(), json);
    if !finished {
        println!();
        println!("⚠️  Reached max steps limit ({}). Use --max-steps to increase.", max_steps);
    }
}

fn drive_program(cycle_ms: u64, timeout_ms: u64, json: bool) {
    use td4::Machine;

    let mut machine = Machine::default();
    machine.set_cycle(cycle_ms);
    if let Err(e) = machine.run() {
        error!("{}", e);
        std::process::exit(1);
    }

    if !machine.wait(Duration::from_millis(timeout_ms)) {
        info!("timeout after {} ms, stopping", timeout_ms);
        machine.stop();
    }

    if let Some(e) = machine.last_error() {
        error!("driver fault: {}", e);
        std::process::exit(1);
    }

    match machine.snapshot() {
        Ok(snap) => report(&snap, json),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn report(snap: &td4::CpuSnapshot, json: bool) {
    if json {
        match serde_json::to_string_pretty(snap) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("❌ Failed to encode state: {}", e),
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Steps: {}", snap.cycles);
    println!("State: {:?}", snap.state);
    println!("PC: {:02}  C: {}", snap.pc, u8::from(snap.carry));
    println!("A: {:04b} ({})", snap.a, snap.a);
    println!("B: {:04b} ({})", snap.b, snap.b);
    println!("LED: {:04b}", snap.led);
}

fn run_self_test() {
    use td4::cpu::decode::{decode, defined_opcodes};
    use td4::{Core, CpuState, Machine, RAMEN_TIMER};

    println!("━━━ TD4 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: decoder table
    print!("Decoder covers 12 opcodes... ");
    if defined_opcodes().count() == 12 && decode(0x8).is_err() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 2: first step
    print!("First step pulses OUT 0111... ");
    let mut core = Core::new();
    if core.step() == Ok(true) && core.led() == 0b0111 && core.pc() == 1 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 3: demo completes
    print!("Demo program completes... ");
    let mut core = Core::new();
    let mut steps = 0;
    while let Ok(true) = core.step() {
        steps += 1;
        if steps > 10_000 {
            break;
        }
    }
    if core.state == CpuState::Halted && core.pc() == 0 {
        println!("✓ ({} steps)", core.cycles);
        passed += 1;
    } else {
        println!("✗ ({:?})", core.state);
        failed += 1;
    }

    // Test 4: reset
    print!("Reset keeps ROM... ");
    core.reset();
    if core.rom().as_bytes() == &RAMEN_TIMER && core.registers().as_bytes() == &[0; 5] {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 5: driver
    print!("Driver runs demo to completion... ");
    let mut machine = Machine::default();
    machine.set_cycle(1);
    let ok = machine.run().is_ok()
        && machine.wait(Duration::from_secs(10))
        && machine.snapshot().map(|s| s.state == CpuState::Halted).unwrap_or(false);
    if ok {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
