//! # Interpreter
//!
//! Deterministic replay of one BFF interaction on a combined tape.
//!
//! ## Machine
//!
//! The combined tape is the A participant followed by the B participant.
//! Two heads and the instruction pointer address it modulo its length.
//! Cells 0 and 1 give the initial heads; execution starts at [`IP_START`].
//!
//! | byte | effect |
//! |------|--------|
//! | `<` `>` | move head0 |
//! | `+` `-` | change the char field at head0, keep id and birth epoch |
//! | `,` | copy the whole token at head0 to head1, advance head1 |
//! | `[` | push ip; halt if the stack is full |
//! | `]` | halt on empty stack; otherwise jump to the top if the char at head0 is non-zero, else pop |
//!
//! Every instruction that does not halt is followed by `ip += 1`. A
//! loop-back therefore lands on the `[` and resumes at the cell after it;
//! the `[` is not executed again and the stack depth is unchanged.
//!
//! The step counter is incremented before dispatch, so a halting
//! instruction is counted and the ip stays on it.

use crate::primitives::{IP_START, MAX_STEPS, STACK_DEPTH};
use crate::Token;
use serde::{Deserialize, Serialize};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Why a replay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Halt {
    /// The step budget was exhausted.
    StepLimit,
    /// `[` executed with a full stack.
    StackOverflow,
    /// `]` executed with an empty stack.
    UnmatchedClose,
}

impl std::fmt::Display for Halt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Halt::StepLimit => f.write_str("step limit"),
            Halt::StackOverflow => f.write_str("stack overflow"),
            Halt::UnmatchedClose => f.write_str("empty stack"),
        }
    }
}

/// What one executed instruction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    MoveHead0 { to: usize },
    SetChar { cell: usize, from: u8, to: u8 },
    Copy { src: usize, dst: usize, id: u32, ch: u8 },
    Push { ip: usize, depth: usize },
    LoopBack { cell: usize, value: u8, target: usize },
    ExitLoop { cell: usize, depth: usize },
    StackOverflow,
    UnmatchedClose,
    Nop,
}

impl Effect {
    /// The halt this effect causes, if any.
    #[must_use]
    pub const fn halt(self) -> Option<Halt> {
        match self {
            Effect::StackOverflow => Some(Halt::StackOverflow),
            Effect::UnmatchedClose => Some(Halt::UnmatchedClose),
            _ => None,
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Effect::MoveHead0 { to } => write!(f, "head0 -> {}", to),
            Effect::SetChar { cell, from, to } => write!(f, "tape[{}] char {} -> {}", cell, from, to),
            Effect::Copy { src, dst, id, ch } => {
                write!(f, "tape[{}] <- tape[{}] (id={}, ch={})", dst, src, id, ch)
            }
            Effect::Push { ip, depth } => write!(f, "push ip={} (depth={})", ip, depth),
            Effect::LoopBack { cell, value, target } => {
                write!(f, "loop (tape[{}]={} != 0) -> ip={}", cell, value, target)
            }
            Effect::ExitLoop { cell, depth } => {
                write!(f, "exit loop (tape[{}]=0) (depth={})", cell, depth)
            }
            Effect::StackOverflow => f.write_str("stack overflow -> HALT"),
            Effect::UnmatchedClose => f.write_str("empty stack -> HALT"),
            Effect::Nop => f.write_str("nop"),
        }
    }
}

/// One executed instruction. Heads are the values after the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub step: u32,
    pub ip: usize,
    pub op: u8,
    pub head0: usize,
    pub head1: usize,
    pub effect: Effect,
}

/// Outcome of a full replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Final A half.
    pub a: Vec<Token>,
    /// Final B half.
    pub b: Vec<Token>,
    pub steps: u32,
    pub halt: Halt,
    /// Per-step trace, empty unless requested.
    pub events: Vec<StepEvent>,
}

// =============================================================================
// MACHINE
// =============================================================================

/// Interpreter state over a private copy of the combined tape.
#[derive(Debug, Clone)]
pub struct Vm {
    tape: Vec<Token>,
    split: usize,
    head0: usize,
    head1: usize,
    ip: usize,
    stack: Vec<usize>,
    steps: u32,
}

impl Vm {
    /// Load `a ++ b` and initialise heads and ip.
    #[must_use]
    pub fn new(a: &[Token], b: &[Token]) -> Self {
        let mut tape = Vec::with_capacity(a.len() + b.len());
        tape.extend_from_slice(a);
        tape.extend_from_slice(b);

        let len = tape.len().max(1);
        let head_at = |cell: usize| tape.get(cell).map_or(0, |t| t.ch() as usize % len);
        let head0 = head_at(0);
        let head1 = head_at(1);

        Self {
            split: a.len(),
            head0,
            head1,
            ip: IP_START % len,
            stack: Vec::with_capacity(STACK_DEPTH),
            steps: 0,
            tape,
        }
    }

    #[must_use]
    pub fn ip(&self) -> usize {
        self.ip
    }

    #[must_use]
    pub fn heads(&self) -> (usize, usize) {
        (self.head0, self.head1)
    }

    #[must_use]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn tape(&self) -> &[Token] {
        &self.tape
    }

    /// Execute one instruction. Returns `None` on an empty tape.
    pub fn step(&mut self) -> Option<StepEvent> {
        let len = self.tape.len();
        let op = self.tape.get(self.ip)?.ch();
        self.steps += 1;

        let executed_ip = self.ip;
        let effect = match op {
            b'<' => {
                self.head0 = (self.head0 + len - 1) % len;
                Effect::MoveHead0 { to: self.head0 }
            }
            b'>' => {
                self.head0 = (self.head0 + 1) % len;
                Effect::MoveHead0 { to: self.head0 }
            }
            b'+' | b'-' => {
                let cell = self.head0;
                let from = self.tape[cell].ch();
                let to = if op == b'+' {
                    from.wrapping_add(1)
                } else {
                    from.wrapping_sub(1)
                };
                self.tape[cell] = self.tape[cell].with_ch(to);
                Effect::SetChar { cell, from, to }
            }
            b',' => {
                let (src, dst) = (self.head0, self.head1);
                let token = self.tape[src];
                self.tape[dst] = token;
                self.head1 = (self.head1 + 1) % len;
                Effect::Copy {
                    src,
                    dst,
                    id: token.id(),
                    ch: token.ch(),
                }
            }
            b'[' => {
                if self.stack_depth() >= STACK_DEPTH {
                    Effect::StackOverflow
                } else {
                    self.stack.push(self.ip);
                    Effect::Push {
                        ip: self.ip,
                        depth: self.stack_depth(),
                    }
                }
            }
            b']' => match self.stack.last().copied() {
                None => Effect::UnmatchedClose,
                Some(top) => {
                    let cell = self.head0;
                    let value = self.tape[cell].ch();
                    if value != 0 {
                        self.ip = top;
                        Effect::LoopBack {
                            cell,
                            value,
                            target: top,
                        }
                    } else {
                        self.stack.pop();
                        Effect::ExitLoop {
                            cell,
                            depth: self.stack_depth(),
                        }
                    }
                }
            },
            _ => Effect::Nop,
        };

        if effect.halt().is_none() {
            self.ip = (self.ip + 1) % len;
        }

        Some(StepEvent {
            step: self.steps,
            ip: executed_ip,
            op,
            head0: self.head0,
            head1: self.head1,
            effect,
        })
    }

    /// Run until `min(max_steps, MAX_STEPS)` steps have executed or the
    /// machine halts. Events are appended to `events` when given.
    pub fn run(&mut self, max_steps: u32, mut events: Option<&mut Vec<StepEvent>>) -> Halt {
        let limit = max_steps.min(MAX_STEPS);
        while self.steps < limit {
            let Some(event) = self.step() else {
                break;
            };
            if let Some(log) = events.as_deref_mut() {
                log.push(event);
            }
            if let Some(halt) = event.effect.halt() {
                return halt;
            }
        }
        Halt::StepLimit
    }

    /// Split the tape back into its A and B halves.
    #[must_use]
    pub fn into_halves(mut self) -> (Vec<Token>, Vec<Token>) {
        let b = self.tape.split_off(self.split);
        (self.tape, b)
    }
}

/// Replay one interaction from the pre-interaction tapes.
#[must_use]
pub fn replay(a: &[Token], b: &[Token], max_steps: u32, record_events: bool) -> Replay {
    let mut vm = Vm::new(a, b);
    let mut events = Vec::new();
    let halt = vm.run(max_steps, record_events.then_some(&mut events));
    let steps = vm.steps();
    let (a, b) = vm.into_halves();

    Replay {
        a,
        b,
        steps,
        halt,
        events,
    }
}

// =============================================================================
// TESTS
// =============================================================================
