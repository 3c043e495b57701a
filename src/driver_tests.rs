#[cfg(test)]
mod tests {
    use crate::component::{ComponentRegistration, ComponentRegistry};
    use crate::driver::*;
    use crate::options::CompileOptions;
    use crate::validate::{ErrorKind, ERR_AMBIGUOUS_TAG_NAME};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register("Widget", "Widget", &["w"]).unwrap();
        registry.freeze();
        registry
    }

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        PathBuf::from(relative)
    }

    fn output_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_duplicate_code_block_fails_only_that_file() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = vec![
            write(src.path(), "A.razor", "<p>a</p>"),
            write(
                src.path(),
                "Bad.razor",
                "@code { int a; }\n<p>b</p>\n@code { int b; }",
            ),
            write(src.path(), "C.razor", "<w />"),
        ];

        let batch = compile_to_dir(
            src.path(),
            &files,
            &registry(),
            &CompileOptions::default(),
            out.path(),
        );

        assert!(!batch.is_success());
        assert!(batch.fatal.is_none());
        assert_eq!(batch.units.len(), 2);
        assert_eq!(batch.units[0].source_path, "A.razor");
        assert_eq!(batch.units[1].source_path, "C.razor");

        assert_eq!(batch.failures.len(), 1);
        let failure = &batch.failures[0];
        assert_eq!(failure.path, "Bad.razor");
        let diag = &failure.diagnostics[0];
        assert_eq!(diag.kind, ErrorKind::DuplicateCodeBlock);
        assert!(diag.message.contains("line 1"));
        assert!(diag.message.contains("line 3"));

        let names = output_names(out.path());
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.starts_with("Bad.")));
    }

    #[test]
    fn test_results_follow_input_order() {
        let src = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..16)
            .map(|i| write(src.path(), &format!("F{}.razor", i), &format!("<p>@Value{}</p>", i)))
            .collect();
        let sink = MemoryOutput::new();
        let batch = compile_all(
            src.path(),
            &files,
            &registry(),
            &CompileOptions::default(),
            &sink,
        );
        assert!(batch.is_success());
        let order: Vec<String> = batch.units.iter().map(|u| u.source_path.clone()).collect();
        let expected: Vec<String> = (0..16).map(|i| format!("F{}.razor", i)).collect();
        assert_eq!(order, expected);
        assert_eq!(sink.files().len(), 16);
    }

    #[test]
    fn test_second_run_is_identical_and_skips_writes() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = vec![write(src.path(), "Pages/Index.razor", "<h1>@Title</h1>")];
        let options = CompileOptions::default();

        let first = compile_to_dir(src.path(), &files, &registry(), &options, out.path());
        let second = compile_to_dir(src.path(), &files, &registry(), &options, out.path());

        assert_eq!(first.units, second.units);
        assert_eq!(first.unchanged, 0);
        assert_eq!(second.unchanged, 1);

        let unit = &first.units[0];
        let written = fs::read_to_string(out.path().join(&unit.output_file_name)).unwrap();
        assert_eq!(written, unit.generated_source);
    }

    #[test]
    fn test_unfrozen_registry_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let files = vec![write(src.path(), "A.razor", "<p/>")];
        let sink = MemoryOutput::new();
        let batch = compile_all(
            src.path(),
            &files,
            &ComponentRegistry::new(),
            &CompileOptions::default(),
            &sink,
        );
        assert!(matches!(batch.fatal, Some(DriverError::RegistryNotFrozen)));
        assert!(batch.units.is_empty());
        assert!(sink.files().is_empty());
    }

    #[test]
    fn test_conflicting_registration_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let files = vec![write(src.path(), "A.razor", "<w />")];
        let registrations = vec![
            ComponentRegistration {
                type_name: "Widget".to_string(),
                primary_name: "Widget".to_string(),
                aliases: vec!["w".to_string()],
            },
            ComponentRegistration {
                type_name: "Wrapper".to_string(),
                primary_name: "W".to_string(),
                aliases: Vec::new(),
            },
        ];
        let sink = MemoryOutput::new();
        let batch = compile_registered(
            src.path(),
            &files,
            &registrations,
            &CompileOptions::default(),
            &sink,
        );

        let Some(DriverError::Registry(err)) = &batch.fatal else {
            panic!("expected a registry error, got {:?}", batch.fatal);
        };
        assert_eq!(err.kind(), ErrorKind::AmbiguousTagName);
        assert!(batch
            .fatal
            .as_ref()
            .is_some_and(|e| e.to_string().starts_with(ERR_AMBIGUOUS_TAG_NAME)));
        assert!(batch.units.is_empty());
        assert!(batch.failures.is_empty());
        assert!(sink.files().is_empty());
    }

    #[test]
    fn test_registrations_compile_when_consistent() {
        let src = tempfile::tempdir().unwrap();
        let files = vec![write(src.path(), "A.razor", "<w />")];
        let registrations = vec![ComponentRegistration {
            type_name: "Shop.Widget".to_string(),
            primary_name: "Widget".to_string(),
            aliases: vec!["w".to_string()],
        }];
        let sink = MemoryOutput::new();
        let batch = compile_registered(
            src.path(),
            &files,
            &registrations,
            &CompileOptions::default(),
            &sink,
        );
        assert!(batch.is_success());
        assert!(batch.units[0]
            .generated_source
            .contains("OpenComponent<Shop.Widget>(0);"));
    }

    #[test]
    fn test_output_path_that_is_a_file_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let files = vec![write(src.path(), "A.razor", "<p/>")];
        let blocker = src.path().join("out");
        fs::write(&blocker, "not a directory").unwrap();

        let batch = compile_to_dir(
            src.path(),
            &files,
            &registry(),
            &CompileOptions::default(),
            &blocker,
        );
        assert!(matches!(
            batch.fatal,
            Some(DriverError::OutputDirectory { .. })
        ));
        assert!(batch.units.is_empty());
    }

    #[test]
    fn test_lost_output_directory_halts_batch() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let out_dir = out.path().join("gen");
        let files = vec![
            write(src.path(), "A.razor", "<p>a</p>"),
            write(src.path(), "B.razor", "<p>b</p>"),
        ];
        let sink = FsOutput::new(&out_dir).unwrap();
        fs::remove_dir_all(&out_dir).unwrap();

        let options = CompileOptions {
            parallel: false,
            ..Default::default()
        };
        let batch = compile_all(src.path(), &files, &registry(), &options, &sink);
        assert!(matches!(batch.fatal, Some(DriverError::OutputLost { .. })));
        assert_eq!(batch.skipped, vec!["A.razor", "B.razor"]);
        assert!(!batch.is_success());
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let src = tempfile::tempdir().unwrap();
        let sink = MemoryOutput::new();
        let batch = compile_all(
            src.path(),
            &[PathBuf::from("Missing.razor")],
            &registry(),
            &CompileOptions::default(),
            &sink,
        );
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].diagnostics[0].kind, ErrorKind::Io);
    }

    #[test]
    fn test_sibling_stylesheet_is_attached() {
        let src = tempfile::tempdir().unwrap();
        let files = vec![write(src.path(), "Pages/Card.razor", "<div>card</div>")];
        write(src.path(), "Pages/Card.css", ".card {}");
        let options = CompileOptions {
            sibling_stylesheets: true,
            ..Default::default()
        };
        let sink = MemoryOutput::new();
        let batch = compile_all(src.path(), &files, &registry(), &options, &sink);
        assert!(batch.is_success());
        assert!(batch.units[0]
            .generated_source
            .contains("AttachStyleSheet(\"Pages/Card.css\");"));
    }

    #[test]
    fn test_strict_mode_reports_all_diagnostics() {
        let options = CompileOptions {
            strict: true,
            ..Default::default()
        };
        let failure = compile_source(
            "Bad.razor",
            "<Widget onclick=@A />\n<w onkeyup=@B />",
            &registry(),
            &options,
        )
        .unwrap_err();
        assert_eq!(failure.diagnostics.len(), 2);
    }
}
