use ljit::Compilation;

#[test]
fn no_errors() {
    let mut compilation = Compilation::from_source(r#"
        ; length of a list
        (labels ((length (code (l)
                          (if (nil? l)
                              0
                              (add1 (labelcall length (cdr l)))))))
          (labelcall length (cons 1 (cons 2 ()))))
    "#);

    let diagnostics = compilation.errors().collect::<Vec<_>>();

    assert!(diagnostics.is_empty());
}

#[test]
fn error_points_at_symbol() {
    let source = "(let ((count 1))\n  (+ cuont 1))";
    let mut compilation = Compilation::from_source(source);

    let diagnostics = compilation.errors().collect::<Vec<_>>();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(&source[diagnostics[0].span.source_range()], "cuont");
    assert_eq!(diagnostics[0].message, "unbound variable `cuont`");
}

#[test]
fn reader_error_stops_compilation() {
    let mut compilation = Compilation::from_source("(add1 x");

    let diagnostics = compilation.errors().collect::<Vec<_>>();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "list is never closed");
    assert_eq!(diagnostics[0].span.source_range(), 0..7);
}
