// tests/cli.rs
//
// Поведение бинаря `era`: коды выхода и вывод.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use era_tools::consts::METADATA_BLOCK_SIZE;

const DESCRIPTION: &str = r#"<superblock block_size="128" nr_blocks="16" current_era="4">
  <writeset era="3" nr_bits="16">
    <bit block="5" value="true"/>
  </writeset>
  <era_array>
    <era block="0" era="1"/>
    <era block="1" era="2"/>
    <era block="2" era="2"/>
  </era_array>
</superblock>
"#;

fn era() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_era"));
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn invalidate_requires_written_since() -> Result<()> {
    let root = unique_root("cli-ws");
    // store нарочно не существует: ошибка должна случиться раньше его открытия
    let missing = root.join("no-such-metadata");
    let out = era()
        .args(["invalidate", missing.to_str().unwrap()])
        .output()?;
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Please specify --written-since"), "{}", stderr);
    assert!(!stderr.contains("no-such-metadata"), "{}", stderr);
    Ok(())
}

#[test]
fn help_and_version_exit_zero_bad_args_exit_one() -> Result<()> {
    assert_eq!(era().arg("--help").output()?.status.code(), Some(0));
    assert_eq!(era().arg("--version").output()?.status.code(), Some(0));
    assert_eq!(
        era().args(["invalidate", "--help"]).output()?.status.code(),
        Some(0)
    );
    assert_eq!(
        era().args(["invalidate", "--bogus"]).output()?.status.code(),
        Some(1)
    );
    assert_eq!(era().args(["restore"]).output()?.status.code(), Some(1));
    Ok(())
}

#[test]
fn restore_invalidate_dump_check_via_cli() -> Result<()> {
    let root = unique_root("cli-flow");
    fs::create_dir_all(&root)?;
    let xml = root.join("md.xml");
    let md = root.join("md.bin");
    fs::write(&xml, DESCRIPTION)?;
    fs::write(&md, vec![0u8; METADATA_BLOCK_SIZE])?;

    let st = era()
        .args(["restore", "-q", "-i"])
        .arg(&xml)
        .arg("-o")
        .arg(&md)
        .status()?;
    assert!(st.success());

    let out = era()
        .args(["invalidate", "--written-since", "2"])
        .arg(&md)
        .output()?;
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout)?;
    assert_eq!(
        stdout,
        "<blocks>\n  <range begin=\"1\" end=\"3\"/>\n  <block block=\"5\"/>\n</blocks>\n"
    );

    // --metadata-snapshot без снапшота — ошибка
    let out = era()
        .args(["invalidate", "-w", "0", "--metadata-snapshot"])
        .arg(&md)
        .output()?;
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no metadata snapshot taken."));

    let out = era().arg("dump").arg(&md).output()?;
    assert!(out.status.success());
    let dumped = String::from_utf8(out.stdout)?;
    assert!(dumped.contains(r#"<bit block="5" value="true"/>"#));

    let out = era().args(["check", "--json"]).arg(&md).output()?;
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(report["severity"], "no_error");
    assert_eq!(report["written_blocks"], 3);

    // пустой вход restore → ошибка и нулевой суперблок → check падает
    let bad = root.join("bad.xml");
    fs::write(&bad, "")?;
    let st = era()
        .args(["restore", "-i"])
        .arg(&bad)
        .arg("-o")
        .arg(&md)
        .status()?;
    assert_eq!(st.code(), Some(1));
    let st = era().args(["check", "-q"]).arg(&md).status()?;
    assert_eq!(st.code(), Some(1));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("era-{}-{}-{}", prefix, pid, t))
}
