mod util;

use ljit::{Compilation, Config, Error, Pos, RunFailure, Span};
use std::path::{Path, PathBuf};

pub struct Test {
    pub path: PathBuf,
    pub source: String,
    pub expected_errors: Vec<Error>,
    pub expected_output: Option<Vec<String>>,
}

pub struct CompilationOutcome {
    pub extra_errors: Vec<Error>,
    pub missing_errors: Vec<Error>,
    pub wrong_messages: Vec<(Error, Error)>,
}

pub struct RunOutcome {
    pub output: Vec<String>,
    pub expected_output: Vec<String>,
}

pub enum TestOutcome {
    Success,
    BadCompilation(CompilationOutcome),
    BadRun(RunOutcome),
}

impl Test {
    fn from_file(path: PathBuf, should_run: bool) -> Test {
        let source = util::read_file(&path);
        let expected_errors = extract_expected_errors(&path, &source);
        let expected_output = if should_run {
            Some(extract_expected_outputs(&path, &source))
        } else {
            None
        };
        Test {
            path,
            source,
            expected_errors,
            expected_output,
        }
    }

    fn compile(&self) -> CompilationOutcome {
        let actual_errors = Compilation::from_source(&self.source).errors().collect::<Vec<_>>();
        let mut extra_errors = actual_errors;
        let mut missing_errors = Vec::new();
        let mut wrong_messages = Vec::new();
        for expected in &self.expected_errors {
            let mut has_match = false;
            for (i, err) in extra_errors.iter().enumerate() {
                if matches(expected, err) {
                    extra_errors.remove(i);
                    has_match = true;
                    break;
                } else if matches_span(expected.span, err.span) {
                    wrong_messages.push((expected.clone(), extra_errors.remove(i)));
                    has_match = true;
                    break;
                }
            }
            if !has_match {
                missing_errors.push(expected.clone());
            }
        }
        CompilationOutcome {
            extra_errors,
            missing_errors,
            wrong_messages,
        }
    }

    fn run_program(&self, expected_output: &[String]) -> RunOutcome {
        let mut compilation = Compilation::from_source(&self.source);
        // programs in run-pass allocate far less than the default heap
        let output = match unsafe { compilation.run(&Config::default()) } {
            Ok(value) => vec![value.to_string()],
            Err(RunFailure::Diagnostic(e)) => vec![format!("error: {}", e.message)],
            Err(RunFailure::Runtime(e)) => vec![format!("runtime error: {}", e)],
        };
        RunOutcome {
            output,
            expected_output: expected_output.to_vec(),
        }
    }

    pub fn run(&self) -> TestOutcome {
        let compilation = self.compile();
        if !compilation.is_success() {
            return TestOutcome::BadCompilation(compilation);
        }

        if let Some(expected_output) = &self.expected_output {
            if cfg!(target_arch = "x86_64") {
                let run = self.run_program(expected_output);
                if !run.is_success() {
                    return TestOutcome::BadRun(run);
                }
            }
        }

        TestOutcome::Success
    }
}

impl CompilationOutcome {
    pub fn is_success(&self) -> bool {
        self.extra_errors.is_empty() &&
        self.missing_errors.is_empty() &&
        self.wrong_messages.is_empty()
    }
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.output == self.expected_output
    }
}

/// Lines of `source` with their starting offsets.
fn lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= source.len() {
            return None;
        }
        let line_end = source[pos..].find('\n').map(|i| i + 1).unwrap_or(source.len() - pos);
        let line = &source[pos..][..line_end];
        let start = pos;
        pos += line.len();
        Some((start, line))
    })
}

/// `; ^^^ ERROR: message` marks the columns of the line above it.
fn extract_expected_errors(path: &Path, source: &str) -> Vec<Error> {
    const ERROR_MARKER: &str = "ERROR: ";
    let mut prev_line_pos: Option<usize> = None;
    let mut errors = Vec::new();
    for (index, (pos, line)) in lines(source).enumerate() {
        if line.starts_with(';') && line.contains(ERROR_MARKER) {
            let error_idx = line.find(ERROR_MARKER).unwrap();
            let message_start = error_idx + ERROR_MARKER.len();
            let message = line[message_start..].trim().to_owned();
            let prev_line_pos = prev_line_pos.unwrap_or_else(|| {
                panic!("error marker on the first line of {}", path.display());
            });
            let span_start = match line[..error_idx].find('^') {
                Some(start) => start,
                None => panic!("error marker without carets at {}:{}", path.display(), index + 1),
            };
            let span_start = Pos::new((prev_line_pos + span_start) as u32);
            let span_end = line[..error_idx].rfind('^').unwrap() + 1;
            let span_end = Pos::new((prev_line_pos + span_end) as u32);
            let span = Span::new(span_start, span_end);
            errors.push(Error { span, message });
        } else if line.contains("ERROR") {
            panic!("incorrect error marker at {}:{}", path.display(), index + 1);
        }
        prev_line_pos = Some(pos);
    }
    errors
}

fn extract_expected_outputs(path: &Path, source: &str) -> Vec<String> {
    const EXPECT_MARKER: &str = "EXPECT: ";
    let mut outputs = Vec::new();
    for (index, (_, line)) in lines(source).enumerate() {
        if line.starts_with(';') && line.contains(EXPECT_MARKER) {
            let expect_idx = line.find(EXPECT_MARKER).unwrap();
            let message_start = expect_idx + EXPECT_MARKER.len();
            outputs.push(line[message_start..].trim().to_owned());
        } else if line.contains("EXPECT") {
            panic!("incorrect expect marker at {}:{}", path.display(), index + 1);
        }
    }
    outputs
}

fn get_tests_in_dir(dir: &Path, should_run: bool) -> Vec<Test> {
    let mut tests = Vec::new();
    for (ty, entry) in util::read_dir(dir) {
        let path = entry.path();
        if ty.is_file() && util::extension(&path) == Some("lisp") {
            tests.push(Test::from_file(path, should_run));
        }
    }
    tests
}

fn get_compile_fail_tests(mut root_path: PathBuf) -> Vec<Test> {
    root_path.push("compile-fail");
    get_tests_in_dir(&root_path, false)
}

fn get_run_pass_tests(mut root_path: PathBuf) -> Vec<Test> {
    root_path.push("run-pass");
    get_tests_in_dir(&root_path, true)
}

pub fn get_tests(root_path: PathBuf) -> Vec<Test> {
    let mut tests = Vec::new();

    for test in get_compile_fail_tests(root_path.clone()) {
        if test.expected_errors.is_empty() {
            panic!("test {} is in compile-fail, but has no error markers", test.path.display());
        }
        tests.push(test);
    }

    for test in get_run_pass_tests(root_path) {
        if !test.expected_errors.is_empty() {
            panic!("test {} is in run-pass, but has error markers", test.path.display());
        }
        match &test.expected_output {
            Some(output) if output.len() == 1 => {}
            _ => panic!("test {} must have exactly one EXPECT marker", test.path.display()),
        }
        tests.push(test);
    }

    tests
}

fn matches_span(expected: Span, actual: Span) -> bool {
    if expected == actual {
        return true;
    }
    // zero length spans are ok if expected span is at the same
    // position and 1-length, because we don't have a way to
    // mark expected zero length spans
    actual.source_len() == 0 &&
        expected.source_len() == 1 &&
        actual.start() == expected.start()
}

fn matches(expected: &Error, actual: &Error) -> bool {
    if !matches_span(expected.span, actual.span) {
        false
    } else {
        actual.message.contains(&expected.message)
    }
}

#[test]
fn markers_point_at_previous_line() {
    let source = "(add1 x)\n;     ^ ERROR: unbound variable\n";
    let errors = extract_expected_errors(Path::new("test.lisp"), source);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span.source_range(), 6..7);
    assert_eq!(errors[0].message, "unbound variable");
}

#[test]
fn expect_markers() {
    let source = "(+ 1 2)\n; EXPECT: 3\n";
    let outputs = extract_expected_outputs(Path::new("test.lisp"), source);
    assert_eq!(outputs, vec!["3".to_owned()]);
}

#[test]
fn compiler_tests() {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.push("programs");
    let prefix = dir.clone();

    let tests = get_tests(dir);
    assert!(!tests.is_empty(), "no test programs found");

    for test in tests {
        let outcome = test.run();
        match outcome {
            TestOutcome::Success => {}
            _ => {
                let name = test.path.strip_prefix(&prefix).unwrap_or(&test.path);
                panic!("test {} failed", name.display());
            }
        }
    }
}
