//! The drag-and-drop prompt loop.
//!
//! Each line read from the input is taken as a path. Files go to the shared
//! single-file folder, folders get their own `<name><suffix>` folder, and the
//! loop keeps going until the input ends.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use console::style;

use crate::batch::{self, folder_name, OutputLayout};
use crate::DocumentConverter;

pub const FAREWELL: &str = "Saindo do programa. Até mais!";

const PROMPT: &str =
    "Arraste o arquivo ou pasta aqui e pressione Enter (ou feche a janela para sair): ";

const BANNER: &str = r"
  __  __            _    ___ _   _   _
 |  \/  | __ _ _ __| | _|_ _| |_| | | |_ __
 | |\/| |/ _` | '__| |/ /| || __| | | | '_ \
 | |  | | (_| | |  |   < | || |_| |_| | |_) |
 |_|  |_|\__,_|_|  |_|\_\___|\__|\___/| .__/
                                      |_|";

pub fn print_welcome<W: Write>(out: &mut W, exe_name: &str) -> io::Result<()> {
    writeln!(out, "{}", style(BANNER).cyan().bold())?;
    writeln!(out)?;
    writeln!(out, "{}", style("Bem-vindo ao conversor de arquivos para Markdown!").bold())?;
    writeln!(
        out,
        "Arraste um arquivo ou uma pasta para esta janela (ou para o '{}') e pressione Enter.",
        exe_name
    )?;
    writeln!(
        out,
        "Formatos suportados: PDF, DOCX, PPTX, XLSX, HTML, imagens, áudio, CSV, JSON, XML e EPUB."
    )?;
    Ok(())
}

/// Drops surrounding whitespace, then the quotes terminals add around dragged paths.
/// Single quotes only count as quoting when they wrap the whole path.
pub fn clean_path(raw: &str) -> &str {
    let path = raw.trim().trim_matches('"');
    path.strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
        .unwrap_or(path)
}

/// Goodbye line for end of input and Ctrl-C.
pub fn farewell<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\n{}", FAREWELL)?;
    out.flush()
}

pub struct Session<C> {
    converter: C,
    layout: OutputLayout,
}

impl<C: DocumentConverter> Session<C> {
    pub fn new(converter: C, layout: OutputLayout) -> Self {
        Self { converter, layout }
    }

    /// Prompts until `input` is exhausted. Errors from a single request are
    /// reported and the loop continues; only a failing `out` ends it early.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, out: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(out, "\n{}", style(PROMPT).magenta())?;
            out.flush()?;

            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    self.report_unexpected(&e, out)?;
                    continue;
                }
                Err(e) => {
                    log::warn!("stopped reading input: {}", e);
                    break;
                }
            }

            let path = Path::new(clean_path(&line));
            if let Err(e) = self.handle(path, out) {
                self.report_unexpected(&e, out)?;
            }
        }

        farewell(out)
    }

    fn handle<W: Write>(&self, path: &Path, out: &mut W) -> io::Result<()> {
        if !path.exists() {
            writeln!(
                out,
                "{}",
                style("Erro: O arquivo ou pasta não foi encontrado. Tente arrastar novamente.").red()
            )?;
            return Ok(());
        }

        if path.is_file() {
            let output_dir = self.layout.single_file_dir();
            fs::create_dir_all(&output_dir)?;
            writeln!(out, "\nIniciando conversão de arquivo único...")?;
            batch::convert_single_file(&self.converter, path, &output_dir, out)?;
            writeln!(
                out,
                "{}",
                style(format!(
                    "\nConcluído! O arquivo convertido está na pasta '{}'.",
                    output_dir.display()
                ))
                .green()
            )?;
        } else if path.is_dir() {
            let output_dir = self.layout.folder_dir(path);
            fs::create_dir_all(&output_dir)?;
            writeln!(out, "\nIniciando conversão da pasta '{}'...", folder_name(path))?;
            writeln!(out, "Os resultados serão salvos em '{}'.", output_dir.display())?;
            batch::convert_folder(&self.converter, path, &output_dir, out)?;
        } else {
            writeln!(
                out,
                "{}",
                style("Entrada inválida. Por favor, arraste um arquivo ou uma pasta.").red()
            )?;
        }
        Ok(())
    }

    fn report_unexpected<W: Write>(&self, error: &io::Error, out: &mut W) -> io::Result<()> {
        log::warn!("request failed: {}", error);
        writeln!(
            out,
            "{}",
            style(format!("\nOcorreu um erro inesperado: {}", error)).red()
        )?;
        writeln!(
            out,
            "{}",
            style("Por favor, tente novamente ou feche o programa.").yellow()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::testing::FakeConverter;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn session(base: &Path) -> Session<FakeConverter> {
        Session::new(FakeConverter::new(), OutputLayout::new(base, &Settings::default()))
    }

    fn run_lines(session: &Session<FakeConverter>, input: &str) -> String {
        let mut out = Vec::new();
        session.run(Cursor::new(input.to_string()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("  \"/home/ana/Relatório Final.pdf\"\n"), "/home/ana/Relatório Final.pdf");
        assert_eq!(clean_path("'/tmp/a b.docx'\r\n"), "/tmp/a b.docx");
        assert_eq!(clean_path("/tmp/plain.csv"), "/tmp/plain.csv");
        assert_eq!(clean_path("   \n"), "");
    }

    #[test]
    fn test_clean_path_keeps_apostrophes_in_names() {
        assert_eq!(clean_path("/docs/'s-Hertogenbosch.pdf"), "/docs/'s-Hertogenbosch.pdf");
        assert_eq!(clean_path("/docs/rock 'n'\n"), "/docs/rock 'n'");
        assert_eq!(clean_path("\"/docs/d'Ávila.pdf\""), "/docs/d'Ávila.pdf");
        assert_eq!(clean_path("'"), "'");
    }

    #[test]
    fn test_farewell() {
        let mut out = Vec::new();
        farewell(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("\n{}\n", FAREWELL));
    }

    /// Fails its first read with `Interrupted`, as a signal arriving mid-read does.
    struct InterruptedRead {
        fired: bool,
    }

    impl io::Read for InterruptedRead {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            if self.fired {
                return Ok(0);
            }
            self.fired = true;
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal"))
        }
    }

    #[test]
    fn test_interrupted_prompt_ends_quietly() {
        let base = TempDir::new().unwrap();
        let session = session(base.path());
        let input = io::BufReader::new(InterruptedRead { fired: false });
        let mut out = Vec::new();

        session.run(input, &mut out).unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.trim_end().ends_with(FAREWELL));
        assert!(!printed.contains("Ocorreu um erro inesperado"));
        assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_end_of_input_says_goodbye() {
        let base = TempDir::new().unwrap();
        let printed = run_lines(&session(base.path()), "");
        assert!(printed.contains("Arraste o arquivo ou pasta aqui"));
        assert!(printed.trim_end().ends_with(FAREWELL));
    }

    #[test]
    fn test_missing_path_creates_nothing() {
        let base = TempDir::new().unwrap();
        let session = session(base.path());
        let printed = run_lines(&session, "/definitely/not/here.pdf\n");

        assert!(printed.contains("não foi encontrado"));
        assert!(session.converter.call_names().is_empty());
        assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_blank_line_is_not_found() {
        let base = TempDir::new().unwrap();
        let printed = run_lines(&session(base.path()), "\n");
        assert!(printed.contains("não foi encontrado"));
    }

    #[test]
    fn test_quoted_file_is_converted() {
        let base = TempDir::new().unwrap();
        let inbox = TempDir::new().unwrap();
        let file = inbox.path().join("ata de reunião.pdf");
        fs::write(&file, b"%PDF-1.4").unwrap();
        let session = session(base.path());

        let printed = run_lines(&session, &format!("\"{}\"\n", file.display()));

        assert!(printed.contains("Iniciando conversão de arquivo único..."));
        assert!(printed.contains("Sucesso!"));
        assert!(base.path().join("arquivos_convertidos/ata de reunião.md").is_file());
        assert_eq!(session.converter.call_names(), vec!["ata de reunião.pdf"]);
    }

    #[test]
    fn test_folder_gets_its_own_output() {
        let base = TempDir::new().unwrap();
        let inbox = TempDir::new().unwrap();
        let folder = inbox.path().join("relatorios");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("q1.xlsx"), b"x").unwrap();
        fs::write(folder.join("q2.csv"), b"x").unwrap();
        fs::write(folder.join("leia-me.txt"), b"x").unwrap();
        let session = session(base.path());

        let printed = run_lines(&session, &format!("{}\n", folder.display()));

        assert!(printed.contains("Iniciando conversão da pasta 'relatorios'..."));
        assert!(printed.contains("2 de 2 arquivos"));
        let output_dir = base.path().join("relatorios_convertido");
        assert!(output_dir.join("q1.md").is_file());
        assert!(output_dir.join("q2.md").is_file());
        assert!(!output_dir.join("leia-me.md").exists());
    }

    #[test]
    fn test_loop_continues_after_each_request() {
        let base = TempDir::new().unwrap();
        let inbox = TempDir::new().unwrap();
        let file = inbox.path().join("notas.html");
        fs::write(&file, b"<p>oi</p>").unwrap();
        let session = session(base.path());

        let input = format!("/nope\n{}\n", file.display());
        let printed = run_lines(&session, &input);

        assert!(printed.contains("não foi encontrado"));
        assert!(printed.contains("Sucesso!"));
        assert_eq!(printed.matches("Arraste o arquivo ou pasta aqui").count(), 3);
    }

    #[test]
    fn test_unexpected_error_keeps_prompting() {
        // output base is a regular file, so the output folder cannot be created
        let inbox = TempDir::new().unwrap();
        let base = inbox.path().join("not-a-dir");
        fs::write(&base, b"").unwrap();
        let file = inbox.path().join("a.json");
        fs::write(&file, b"{}").unwrap();
        let session = session(&base);

        let printed = run_lines(&session, &format!("{}\n", file.display()));

        assert!(printed.contains("Ocorreu um erro inesperado"));
        assert!(printed.contains("Por favor, tente novamente"));
        assert!(printed.trim_end().ends_with(FAREWELL));
    }

    #[cfg(unix)]
    #[test]
    fn test_neither_file_nor_folder() {
        let base = TempDir::new().unwrap();
        let printed = run_lines(&session(base.path()), "/dev/null\n");
        assert!(printed.contains("Entrada inválida"));
    }

    #[test]
    fn test_welcome_mentions_executable() {
        let mut out = Vec::new();
        print_welcome(&mut out, "markitup").unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("'markitup'"));
        assert!(printed.contains("Bem-vindo"));
    }
}
