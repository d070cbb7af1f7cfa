use std::borrow::Cow;

/// Destination for text produced by `print()` and `PRINT_EXPR`.
///
/// The interpreter never writes to stdout directly; every byte of program output
/// goes through the writer handed to the VM driver.
pub trait PrintWriter {
    /// Writes a run of text, such as one formatted argument or a multi-character separator.
    fn stdout_write(&mut self, output: Cow<'_, str>);

    /// Writes a single character, typically a space separator or the trailing newline.
    fn stdout_push(&mut self, end: char);
}

/// Writes to the process's stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        print!("{output}");
    }

    fn stdout_push(&mut self, end: char) {
        print!("{end}");
    }
}

/// Buffers all output in memory, used by tests and the fixture runner.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        self.0.push_str(&output);
    }

    fn stdout_push(&mut self, end: char) {
        self.0.push(end);
    }
}

/// Discards everything, used by benchmarks.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) {}

    fn stdout_push(&mut self, _end: char) {}
}
