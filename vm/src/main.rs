use std::process;

use clap::{Parser, ValueEnum};
use log::info;
use object::Value;

use vm::{MethodBuilder, VM, VmSettings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run built-in bytecode scenarios", long_about = None)]
struct Cli {
    /// Scenario to run; all of them when omitted
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,

    /// List the scenarios and exit
    #[arg(long)]
    list: bool,

    /// Print each scenario's bytecode before running it
    #[arg(long)]
    disassemble: bool,

    /// Maximum number of live contexts
    #[arg(long, default_value_t = VmSettings::default().max_depth)]
    max_depth: usize,

    /// Resolve outer temporaries through the block's bound context
    /// instead of the sender
    #[arg(long)]
    lexical_blocks: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Answer,
    Nested,
    Multiply,
    Branch,
    Exception,
}

impl Scenario {
    const ALL: [Scenario; 5] = [
        Scenario::Answer,
        Scenario::Nested,
        Scenario::Multiply,
        Scenario::Branch,
        Scenario::Exception,
    ];

    fn name(self) -> &'static str {
        match self {
            Scenario::Answer => "answer",
            Scenario::Nested => "nested",
            Scenario::Multiply => "multiply",
            Scenario::Branch => "branch",
            Scenario::Exception => "exception",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Scenario::Answer => "a method answering its literal 42",
            Scenario::Nested => "10 stays beneath the result of a nested send",
            Scenario::Multiply => "5 * (5 returnValue)",
            Scenario::Branch => "sum 1..10 with a backward jump",
            Scenario::Exception => "[1 / 0] on: ZeroDivide do: [:e | e messageText]",
        }
    }

    /// Build the scenario's method and receiver.
    fn build(self, vm: &mut VM) -> (Value, Value) {
        let int = Value::from_i64;
        match self {
            Scenario::Answer => {
                let mut mb = MethodBuilder::new();
                let answer = mb.literal(int(42));
                mb.push_literal(answer).return_top();
                (mb.build(vm, "answer"), Value::NIL)
            }
            Scenario::Nested => {
                install_return_value(vm);
                let return_value = vm.intern("returnValue");
                let mut mb = MethodBuilder::new();
                mb.push_constant(int(10))
                    .push_self()
                    .send(return_value, 0)
                    .return_top();
                (mb.build(vm, "nested"), int(5))
            }
            Scenario::Multiply => {
                install_return_value(vm);
                let return_value = vm.intern("returnValue");
                let times = vm.intern("*");
                let mut mb = MethodBuilder::new();
                mb.push_self()
                    .push_self()
                    .send(return_value, 0)
                    .send(times, 1)
                    .return_top();
                (mb.build(vm, "multiply"), int(5))
            }
            Scenario::Branch => {
                let le = vm.intern("<=");
                let plus = vm.intern("+");
                let mut mb = MethodBuilder::new();
                mb.temporaries(&["sum", "i"])
                    .push_constant(int(0))
                    .store_temporary(0)
                    .pop()
                    .push_constant(int(1))
                    .store_temporary(1)
                    .pop();
                let top = mb.current_offset();
                mb.push_temporary(1).push_constant(int(10)).send(le, 1);
                let done = mb.jump_if_false();
                mb.push_temporary(0)
                    .push_temporary(1)
                    .send(plus, 1)
                    .store_temporary(0)
                    .pop()
                    .push_temporary(1)
                    .push_constant(int(1))
                    .send(plus, 1)
                    .store_temporary(1)
                    .pop()
                    .jump_back(top);
                mb.bind(done);
                mb.push_temporary(0).return_top();
                (mb.build(vm, "sum"), Value::NIL)
            }
            Scenario::Exception => {
                let divide = vm.intern("/");
                let message_text = vm.intern("messageText");
                let on_do = vm.intern("on:do:");

                let mut body = MethodBuilder::new();
                body.push_constant(int(1))
                    .push_constant(int(0))
                    .send(divide, 1)
                    .return_top();
                let body = body.build_block(vm, Value::NIL);

                let mut handler = MethodBuilder::new();
                handler
                    .arguments(1)
                    .push_temporary(0)
                    .send(message_text, 0)
                    .return_top();
                let handler = handler.build_block(vm, Value::NIL);

                let zero_divide = vm.specials.zero_divide;
                let mut mb = MethodBuilder::new();
                mb.push_constant(body)
                    .push_constant(zero_divide)
                    .push_constant(handler)
                    .send(on_do, 2)
                    .return_top();
                (mb.build(vm, "guarded"), Value::NIL)
            }
        }
    }
}

/// `Integer>>returnValue ^42`
fn install_return_value(vm: &mut VM) {
    let integer = vm.specials.integer;
    let mut mb = MethodBuilder::new();
    mb.push_constant(Value::from_i64(42)).return_top();
    mb.install(vm, integer, "returnValue");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if cli.list {
        for scenario in Scenario::ALL {
            println!("{:<10} {}", scenario.name(), scenario.description());
        }
        return;
    }

    let settings = VmSettings {
        max_depth: cli.max_depth,
        lexical_block_scope: cli.lexical_blocks,
        ..VmSettings::default()
    };
    let scenarios = match cli.scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    let mut failed = false;
    for scenario in scenarios {
        let mut vm = VM::with_settings(settings);
        let (method, receiver) = scenario.build(&mut vm);
        info!("running {}", scenario.name());

        if cli.disassemble {
            println!("== {} ==", scenario.name());
            if let Some(listing) = vm.disassemble(method) {
                print!("{listing}");
            }
        }

        match vm.execute(method, receiver, &[]) {
            Ok(value) => println!("{}: {}", scenario.name(), vm.print_string(value)),
            Err(err) => {
                eprintln!("{}: error: {err}", scenario.name());
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}
