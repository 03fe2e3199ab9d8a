use crate::cli::Command;
use simos_notes_core::{BlobStore, DocumentStore, IncomingFile, Note, Notepad, NotepadError, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Runs one subcommand against an open session, writing its report to `out`.
///
/// `input` supplies note content for `edit` when no file is given.
pub fn run<B: BlobStore, D: DocumentStore>(
    notepad: &mut Notepad<B, D>,
    command: Command,
    export_dir: &Path,
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::List => {
            let active = notepad.active_id().map(str::to_string);
            for note in notepad.notes() {
                let marker = if active.as_deref() == Some(note.id.as_str()) { '*' } else { ' ' };
                writeln!(out, "{marker} {}", note_line(note))?;
            }
        }
        Command::New { title } => {
            let id = notepad.new_note();
            if let Some(title) = title {
                notepad.rename_note(&id, &title)?;
            }
            writeln!(out, "{id}")?;
        }
        Command::Rename { id, title } => notepad.rename_note(&id, &title)?,
        Command::Edit { id, file } => {
            let content = match file {
                Some(path) => fs::read_to_string(path)?,
                None => {
                    let mut content = String::new();
                    input.read_to_string(&mut content)?;
                    content
                }
            };
            notepad.update_content(&id, &content)?;
        }
        Command::Delete { id, yes } => match notepad.delete_note(&id, |_| yes)? {
            Some(result) => writeln!(
                out,
                "Deleted {} ({} attachment(s))",
                result.deleted_id,
                result.attachment_ids.len()
            )?,
            None => writeln!(out, "Not deleted: pass --yes to confirm")?,
        },
        Command::Search { query } => {
            for note in notepad.search(&query) {
                writeln!(out, "{}", note_line(note))?;
            }
        }
        Command::Attach { id, files, inline } => attach(notepad, &id, &files, inline, out)?,
        Command::Export { id, format, out: dir } => {
            let dir = dir.unwrap_or_else(|| export_dir.to_path_buf());
            let path = notepad.export_to(&id, format.into(), &dir)?;
            writeln!(out, "{}", path.display())?;
        }
        Command::Touch { id } => {
            if let Some(id) = id {
                notepad.select(&id)?;
            }
            if !notepad.touch_active() {
                return Err(NotepadError::NoteNotFound("no active note".to_string()));
            }
        }
    }
    Ok(())
}

fn note_line(note: &Note) -> String {
    let updated = chrono::DateTime::from_timestamp_millis(note.updated_at)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!("{}  {updated}  {}", note.id, note.title)
}

fn read_incoming(path: &Path) -> Result<IncomingFile> {
    let data = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(IncomingFile::new(name, "", data))
}

fn attach<B: BlobStore, D: DocumentStore>(
    notepad: &mut Notepad<B, D>,
    note_id: &str,
    paths: &[PathBuf],
    inline: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let files = paths.iter().map(|p| read_incoming(p)).collect::<Result<Vec<_>>>()?;

    if inline && files.len() > 1 {
        for (path, result) in paths.iter().zip(notepad.attach_dropped(note_id, files, None)) {
            match result {
                Ok(attachment) => writeln!(out, "{}  {}", attachment.id, path.display())?,
                Err(e) => writeln!(out, "failed  {}: {e}", path.display())?,
            }
        }
        return Ok(());
    }

    for (path, file) in paths.iter().zip(files) {
        let outcome = notepad.attach_file(note_id, file, inline, None)?;
        writeln!(out, "{}  {}", outcome.attachment.id, path.display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ExportFormatArg;
    use simos_notes_core::{ManualClock, MemoryBlobStore, MemoryDocumentStore, NotepadSettings};
    use tempfile::TempDir;

    type TestNotepad = Notepad<MemoryBlobStore, MemoryDocumentStore>;

    fn notepad() -> TestNotepad {
        Notepad::with_stores(
            MemoryBlobStore::new(),
            MemoryDocumentStore::new(),
            &NotepadSettings::default(),
            Box::new(ManualClock::new(0)),
        )
    }

    fn exec(notepad: &mut TestNotepad, command: Command) -> Result<String> {
        exec_with_input(notepad, command, "")
    }

    fn exec_with_input(notepad: &mut TestNotepad, command: Command, input: &str) -> Result<String> {
        let mut out = Vec::new();
        run(notepad, command, Path::new("."), &mut input.as_bytes(), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_new_list_and_search() {
        let mut np = notepad();
        let id = exec(&mut np, Command::New { title: Some("Groceries".to_string()) }).unwrap();
        let id = id.trim().to_string();

        let listing = exec(&mut np, Command::List).unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("* {id}")));
        assert!(lines[0].ends_with("Groceries"));

        let found = exec(&mut np, Command::Search { query: "grocer".to_string() }).unwrap();
        assert_eq!(found.lines().count(), 1);
    }

    #[test]
    fn test_edit_from_stdin() {
        let mut np = notepad();
        let id = np.active_id().unwrap().to_string();

        exec_with_input(&mut np, Command::Edit { id: id.clone(), file: None }, "<p>typed</p>").unwrap();
        assert_eq!(np.note(&id).unwrap().content, "<p>typed</p>");
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut np = notepad();
        let id = np.new_note();

        let out = exec(&mut np, Command::Delete { id: id.clone(), yes: false }).unwrap();
        assert!(out.starts_with("Not deleted"));
        assert!(np.note(&id).is_some());

        let out = exec(&mut np, Command::Delete { id: id.clone(), yes: true }).unwrap();
        assert!(out.starts_with(&format!("Deleted {id}")));
        assert!(np.note(&id).is_none());
    }

    #[test]
    fn test_attach_and_export() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("pic.png");
        let doc = dir.path().join("readme.txt");
        fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(&doc, "hi").unwrap();

        let mut np = notepad();
        let id = np.active_id().unwrap().to_string();
        let out = exec(
            &mut np,
            Command::Attach { id: id.clone(), files: vec![image, doc], inline: true },
        )
        .unwrap();
        assert_eq!(out.lines().count(), 2);

        let note = np.note(&id).unwrap();
        assert_eq!(note.attachments.len(), 2);
        assert_eq!(note.attachments[0].mime_type, "image/png");
        assert_eq!(note.attachments[1].mime_type, "text/plain");
        assert!(note.content.contains("<img src=\"id:"));

        let export_dir = dir.path().join("out");
        let out = exec(
            &mut np,
            Command::Export { id, format: ExportFormatArg::Html, out: Some(export_dir.clone()) },
        )
        .unwrap();
        assert_eq!(PathBuf::from(out.trim()), export_dir.join("Note.html"));
    }

    #[test]
    fn test_touch_unknown_note() {
        let mut np = notepad();
        let err = exec(&mut np, Command::Touch { id: Some("note-x".to_string()) }).unwrap_err();
        assert!(matches!(err, NotepadError::NoteNotFound(_)));
        assert!(exec(&mut np, Command::Touch { id: None }).is_ok());
    }
}
