use codespan_reporting as cr;
use cr::term::termcolor::{ColorChoice, StandardStream};
use crate::Error;

pub fn config() -> cr::term::Config {
    let chars = cr::term::Chars {
        snippet_start: "-->".to_owned(),
        source_border_left: '|',
        source_border_left_break: '.',
        note_bullet: '=',
        single_primary_caret: '^',
        single_secondary_caret: '-',
        multi_primary_caret_start: '^',
        multi_primary_caret_end: '^',
        multi_secondary_caret_start: '\'',
        multi_secondary_caret_end: '\'',
        multi_top_left: '/',
        multi_top: '-',
        multi_bottom_left: '\\',
        multi_bottom: '-',
        multi_left: '|',
        pointer_left: '|',
    };
    cr::term::Config {
        chars,
        ..cr::term::Config::default()
    }
}

pub fn print_errors(file: &str, source: &str, errors: impl Iterator<Item = Error>) -> Result<(), cr::files::Error> {
    let stream = StandardStream::stderr(ColorChoice::Auto);
    let mut stream = stream.lock();
    let config = config();
    let mut files = cr::files::SimpleFiles::new();
    let file = files.add(file, source);
    for error in errors {
        let diagnostic = cr::diagnostic::Diagnostic::error()
            .with_message(error.message)
            .with_labels(vec![cr::diagnostic::Label::primary(file, error.span.source_range())]);
        cr::term::emit(&mut stream, &config, &files, &diagnostic)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Compilation;
    use cr::term::termcolor::NoColor;

    #[test]
    fn renders_with_ascii_carets() {
        let source = "(add1 x)";
        let error = Compilation::from_source(source).errors().next().unwrap();
        let mut files = cr::files::SimpleFiles::new();
        let file = files.add("test.lisp", source);
        let diagnostic = cr::diagnostic::Diagnostic::error()
            .with_message(error.message)
            .with_labels(vec![cr::diagnostic::Label::primary(file, error.span.source_range())]);
        let mut out = NoColor::new(Vec::new());
        cr::term::emit(&mut out, &config(), &files, &diagnostic).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("unbound variable `x`"), "{}", text);
        assert!(text.contains("--> test.lisp:1:7"), "{}", text);
        assert!(text.contains('^'), "{}", text);
    }
}
