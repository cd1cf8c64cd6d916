use std::path::PathBuf;
use ljit_tests::TestOutcome;

fn main() {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.push("programs");
    let prefix = dir.clone();

    let tests = ljit_tests::get_tests(dir);
    let mut failed = 0;

    for test in tests {
        let path = test.path.strip_prefix(&prefix).unwrap_or(&test.path).display().to_string();
        match test.run() {
            TestOutcome::Success => println!("test {} ... ok", path),
            TestOutcome::BadCompilation(outcome) => {
                failed += 1;
                println!("test {} ... FAILED", path);
                if !outcome.extra_errors.is_empty() {
                    println!("compiler reported {} extra errors", outcome.extra_errors.len());
                    print_errors(&path, &test.source, outcome.extra_errors.into_iter());
                }
                if !outcome.missing_errors.is_empty() {
                    println!("compiler missed {} errors", outcome.missing_errors.len());
                    print_errors(&path, &test.source, outcome.missing_errors.into_iter());
                }
                for (expected, actual) in outcome.wrong_messages {
                    println!("expected message `{}`, got `{}`", expected.message, actual.message);
                }
            }
            TestOutcome::BadRun(outcome) => {
                failed += 1;
                println!("test {} ... FAILED", path);
                println!("expected output: {:?}", outcome.expected_output);
                println!("  actual output: {:?}", outcome.output);
            }
        }
    }

    if failed > 0 {
        println!("{} test(s) failed", failed);
        std::process::exit(1);
    }
}

fn print_errors(path: &str, source: &str, errors: impl Iterator<Item = ljit::Error>) {
    if let Err(e) = ljit::diagnostics::print_errors(path, source, errors) {
        println!("failed to print diagnostics: {}", e);
    }
    println!();
}
