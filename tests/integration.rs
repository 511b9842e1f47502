use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::process::{Command, Output};

const CSHARP: &str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";

fn dotnet_refs(working_dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dotnet-refs"));
    cmd.args(args).arg("--working-directory").arg(working_dir).env_remove("RUST_LOG");
    cmd.output().unwrap()
}

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).unwrap()
}

fn project(references: &[&str]) -> String {
    let mut out = String::from("<Project Sdk=\"Microsoft.NET.Sdk\">\n\n  <ItemGroup>\n");
    for r in references {
        out.push_str(&format!("    <ProjectReference Include=\"{r}\" />\n"));
    }
    out.push_str("  </ItemGroup>\n\n</Project>\n");
    out
}

fn solution(members: &[&str]) -> String {
    let mut out = String::from("Microsoft Visual Studio Solution File, Format Version 12.00\r\n");
    for (i, m) in members.iter().enumerate() {
        let name = Path::new(m).file_stem().unwrap().to_string_lossy().into_owned();
        out.push_str(&format!(
            "Project(\"{CSHARP}\") = \"{name}\", \"{m}\", \"{{00000000-0000-0000-0000-00000000000{i}}}\"\r\nEndProject\r\n"
        ));
    }
    out.push_str("Global\r\nEndGlobal\r\n");
    out
}

fn native(path: &str) -> String {
    path.replace('/', &MAIN_SEPARATOR.to_string())
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn tempdir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

#[test]
fn fix_references_repairs_moved_projects_and_is_idempotent() {
    let (_dir, root) = tempdir();
    write(&root, "src/App/App.csproj", &project(&["..\\Lib\\Lib.csproj"]));
    write(&root, "libs/Lib/Lib.csproj", &project(&[]));
    write(&root, "All.sln", &solution(&["src\\App\\App.csproj", "Lib\\Lib.csproj"]));

    let first = dotnet_refs(&root, &["fix-references"]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(stdout(&first).contains("Done. 2 changed"));

    let app = read(&root, "src/App/App.csproj");
    assert!(app.contains(&format!("Include=\"{}\"", native("../../libs/Lib/Lib.csproj"))));
    let sln = read(&root, "All.sln");
    assert!(sln.contains(&format!("\"{}\"", native("libs/Lib/Lib.csproj"))));
    assert!(sln.contains("\"src\\App\\App.csproj\""));

    let second = dotnet_refs(&root, &["fix-references"]);
    assert!(second.status.success());
    assert!(stdout(&second).contains("Done. 0 changed"));
    assert_eq!(read(&root, "src/App/App.csproj"), app);
}

#[test]
fn ambiguous_project_fails_only_the_referencing_file() {
    let (_dir, root) = tempdir();
    write(&root, "a/Dup.csproj", &project(&[]));
    write(&root, "b/Dup.csproj", &project(&[]));
    write(&root, "App/App.csproj", &project(&["../x/Dup.csproj"]));
    write(&root, "Other/Other.csproj", &project(&["../y/Solo.csproj"]));
    write(&root, "y2/Solo.csproj", &project(&[]));

    let output = dotnet_refs(&root, &["fix-references"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("FAILED"));
    assert!(text.contains("ambiguous project"));
    assert!(read(&root, "App/App.csproj").contains("../x/Dup.csproj"));
    assert!(read(&root, "Other/Other.csproj").contains(&native("../y2/Solo.csproj")));
}

#[test]
fn relocate_then_fix_restores_a_consistent_tree() {
    let (_dir, root) = tempdir();
    write(&root, "messy/App.csproj", &project(&["../Lib/Lib.csproj", "../Core/Core.csproj"]));
    write(&root, "deep/er/Lib.csproj", &project(&["../Core/Core.csproj"]));
    write(&root, "Core.csproj", &project(&[]));
    write(&root, "All.sln", &solution(&["src/App/App.csproj"]));

    let relocate = dotnet_refs(&root, &["relocate-topology", "--entry-point", "All.sln"]);
    assert!(relocate.status.success(), "{}", String::from_utf8_lossy(&relocate.stderr));
    assert!(stdout(&relocate).contains("MOVED"));
    assert!(root.join("src/App/App.csproj").is_file());
    assert!(root.join("src/Lib/Lib.csproj").is_file());
    assert!(root.join("src/Core/Core.csproj").is_file());
    assert!(!root.join("messy/App.csproj").exists());

    let again = dotnet_refs(&root, &["relocate-topology", "-e", "All.sln"]);
    assert!(stdout(&again).contains("Done. 0 changed, 3 unchanged, 0 failed."));

    let fix = dotnet_refs(&root, &["fix-references"]);
    assert!(fix.status.success());
    assert!(stdout(&fix).contains("Done. 0 changed"));
}

#[test]
fn legacy_fix_mode_dispatches_on_entry_point_kind() {
    let (_dir, root) = tempdir();
    write(&root, "old/App.csproj", &project(&[]));
    write(&root, "All.sln", &solution(&["App/App.csproj"]));

    let output = dotnet_refs(&root, &["fix", "--ep", "All.sln"]);
    assert!(output.status.success());
    assert!(root.join("App/App.csproj").is_file());

    let output = dotnet_refs(&root, &["FIX"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Done."));
}

#[test]
fn centralize_versions_writes_manifest_and_is_stable() {
    let (_dir, root) = tempdir();
    write(&root, "All.sln", &solution(&["A\\A.csproj", "B\\B.csproj"]));
    write(
        &root,
        "A/A.csproj",
        "<Project Sdk=\"Microsoft.NET.Sdk\">\n\n  <ItemGroup>\n    <PackageReference Include=\"Serilog\" Version=\"2.9.0\" />\n  </ItemGroup>\n\n</Project>\n",
    );
    write(
        &root,
        "B/B.csproj",
        "<Project Sdk=\"Microsoft.NET.Sdk\">\n\n  <ItemGroup>\n    <PackageReference Include=\"Serilog\" Version=\"2.10.0\" />\n  </ItemGroup>\n\n</Project>\n",
    );

    let output = dotnet_refs(&root, &["centralise", "--entry-point", "All.sln"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("WROTE"));
    assert!(text.contains("1 packages have a non-consistent version."));

    let manifest = read(&root, "Directory.Packages.props");
    assert!(manifest.contains("<ManagePackageVersionsCentrally>true</ManagePackageVersionsCentrally>"));
    assert!(manifest.contains("<PackageVersion Include=\"Serilog\" Version=\"2.10.0\" />"));
    assert!(read(&root, "A/A.csproj").contains("<PackageReference Include=\"Serilog\" VersionOverride=\"2.9.0\" />"));
    assert!(read(&root, "B/B.csproj").contains("<PackageReference Include=\"Serilog\" />"));

    let second = dotnet_refs(&root, &["centralize-versions", "-e", "All.sln"]);
    assert!(second.status.success());
    assert!(stdout(&second).contains("Done. 0 changed"));
    assert_eq!(read(&root, "Directory.Packages.props"), manifest);
}

#[test]
fn internalize_packages_converts_and_completes_solutions() {
    let (_dir, root) = tempdir();
    write(
        &root,
        "App/App.csproj",
        "<Project Sdk=\"Microsoft.NET.Sdk\">\n\n  <ItemGroup>\n    <PackageReference Include=\"Lib\" Version=\"1.0.0\" />\n  </ItemGroup>\n\n</Project>\n",
    );
    write(&root, "Lib/Lib.csproj", &project(&[]));
    write(&root, "All.sln", &solution(&["App/App.csproj"]));

    let output = dotnet_refs(&root, &["internalize", "--reig"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let app = read(&root, "App/App.csproj");
    assert!(!app.contains("PackageReference"));
    assert!(app.contains(&format!("<ProjectReference Include=\"{}\" />", native("../Lib/Lib.csproj"))));
    assert!(read(&root, "All.sln").contains("\"Lib\""));

    let second = dotnet_refs(&root, &["internalise-packages"]);
    assert!(stdout(&second).contains("Done. 0 changed"));
}

#[test]
fn invalid_mode_exits_10() {
    let (_dir, root) = tempdir();
    let output = dotnet_refs(&root, &["tidy-up"]);
    assert_eq!(output.status.code(), Some(10));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid Mode"));
}

#[test]
fn invalid_entry_point_exits_20() {
    let (_dir, root) = tempdir();
    write(&root, "App/App.csproj", &project(&[]));

    let missing = dotnet_refs(&root, &["relocate-topology"]);
    assert_eq!(missing.status.code(), Some(20));
    let wrong_kind = dotnet_refs(&root, &["centralize-versions", "-e", "App/App.csproj"]);
    assert_eq!(wrong_kind.status.code(), Some(20));
    let not_a_dir = dotnet_refs(&root, &["fix-references", "-e", "nowhere"]);
    assert_eq!(not_a_dir.status.code(), Some(20));
}

#[test]
fn invalid_working_directory_exits_30() {
    let (_dir, root) = tempdir();
    let output = dotnet_refs(&root.join("missing"), &["fix-references"]);
    assert_eq!(output.status.code(), Some(30));
}
