use clap::{Parser, Subcommand, ValueEnum};
use simos_notes_core::ExportFormat;
use std::path::PathBuf;

#[derive(Clone, Debug, Eq, Parser, PartialEq)]
#[command(version, about)]
pub struct CliConfig {
    /// Settings file; defaults to the per-user configuration directory.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Directory holding simos-notes.db, overriding the settings file.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
pub enum Command {
    /// List notes in collection order; the active note is marked with `*`.
    List,
    /// Create a note and print its ID.
    New {
        #[arg(long)]
        title: Option<String>,
    },
    Rename {
        id: String,
        title: String,
    },
    /// Replace a note's content with a file, or stdin when no file is given.
    Edit {
        id: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Delete {
        id: String,
        /// Confirm the deletion.
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },
    /// Notes whose title or content contains the query, ignoring case.
    Search {
        #[arg(default_value = "")]
        query: String,
    },
    /// Attach files to a note.
    Attach {
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Also insert images, video and audio into the note content.
        #[arg(long, default_value_t = false)]
        inline: bool,
    },
    Export {
        id: String,
        #[arg(value_enum)]
        format: ExportFormatArg,
        /// Output directory; defaults to the configured export directory.
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Refresh a note's timestamp, as one autosave tick does.
    Touch {
        /// Note to select first; the active note otherwise.
        id: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormatArg {
    Txt,
    Html,
    Pdf,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Txt => ExportFormat::Text,
            ExportFormatArg::Html => ExportFormat::Html,
            ExportFormatArg::Pdf => ExportFormat::Pdf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attach() {
        let cli = CliConfig::try_parse_from([
            "simos-notes",
            "--data-dir",
            "/tmp/notes",
            "attach",
            "note-1",
            "a.png",
            "b.webm",
            "--inline",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/notes")));
        assert_eq!(
            cli.command,
            Command::Attach {
                id: "note-1".to_string(),
                files: vec![PathBuf::from("a.png"), PathBuf::from("b.webm")],
                inline: true,
            }
        );
    }

    #[test]
    fn test_parse_export_format() {
        let cli = CliConfig::try_parse_from(["simos-notes", "export", "note-1", "pdf"]).unwrap();
        match cli.command {
            Command::Export { format, out, .. } => {
                assert_eq!(ExportFormat::from(format), ExportFormat::Pdf);
                assert!(out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(CliConfig::try_parse_from(["simos-notes", "export", "note-1", "docx"]).is_err());
    }

    #[test]
    fn test_attach_requires_files() {
        assert!(CliConfig::try_parse_from(["simos-notes", "attach", "note-1"]).is_err());
    }
}
