// crates/tube_module/src/machine.rs
//! A deliberately tiny stepping machine for the panel to drive.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add(i64),
    Mul(i64),
    Print,
}

#[derive(Debug, Clone)]
pub struct Machine {
    program: Vec<Op>,
    ip: usize,
    acc: i64,
    exe_count: u64,
    messages: Vec<String>,
    step_limit: u64,
}

impl Machine {
    pub const DEFAULT_STEP_LIMIT: u64 = 10_000;

    pub fn new(program: Vec<Op>) -> Self {
        Self {
            program,
            ip: 0,
            acc: 0,
            exe_count: 0,
            messages: Vec::new(),
            step_limit: Self::DEFAULT_STEP_LIMIT,
        }
    }

    /// Counts 1, 2, 6, 24 and prints each.
    pub fn demo() -> Self {
        use Op::*;
        Self::new(vec![
            Add(1),
            Print,
            Mul(2),
            Print,
            Mul(3),
            Print,
            Mul(4),
            Print,
        ])
    }

    pub fn restart(&mut self) {
        self.ip = 0;
        self.acc = 0;
        self.exe_count = 0;
        self.messages.clear();
    }

    /// Executes the op at the instruction pointer. False once past the end.
    pub fn run_step(&mut self) -> bool {
        let Some(op) = self.program.get(self.ip).copied() else {
            return false;
        };
        match op {
            Op::Add(n) => self.acc = self.acc.wrapping_add(n),
            Op::Mul(n) => self.acc = self.acc.wrapping_mul(n),
            Op::Print => self.messages.push(format!("acc = {}", self.acc)),
        }
        self.ip += 1;
        self.exe_count += 1;
        true
    }

    /// Runs to the end, or until the step limit. Returns steps executed.
    pub fn run(&mut self) -> u64 {
        let mut steps = 0;
        while steps < self.step_limit && self.run_step() {
            steps += 1;
        }
        steps
    }

    pub fn is_finished(&self) -> bool {
        self.ip >= self.program.len()
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn program_len(&self) -> usize {
        self.program.len()
    }

    pub fn acc(&self) -> i64 {
        self.acc
    }

    pub fn exe_count(&self) -> u64 {
        self.exe_count
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::demo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_to_factorials() {
        let mut m = Machine::demo();
        assert_eq!(m.run(), 8);
        assert!(m.is_finished());
        assert_eq!(m.acc(), 24);
        assert_eq!(m.messages(), ["acc = 1", "acc = 2", "acc = 6", "acc = 24"]);
        assert!(!m.run_step());
        assert_eq!(m.exe_count(), 8);
    }

    #[test]
    fn restart_rewinds_everything() {
        let mut m = Machine::demo();
        m.run_step();
        m.run_step();
        m.restart();
        assert_eq!((m.ip(), m.acc(), m.exe_count()), (0, 0, 0));
        assert!(m.messages().is_empty());
    }

    #[test]
    fn empty_program_is_finished() {
        let mut m = Machine::new(Vec::new());
        assert!(m.is_finished());
        assert_eq!(m.run(), 0);
    }
}
