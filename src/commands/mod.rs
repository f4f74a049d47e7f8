use colored::Colorize;

use crate::document;
use crate::qa::QaEngine;

struct LoadedDocument {
    path: String,
    doc_id: String,
    words: usize,
    segments: usize,
}

/// Interactive command loop state: the engine plus the most recently
/// loaded document.
pub struct CommandHandler {
    engine: QaEngine,
    document: Option<LoadedDocument>,
}

impl CommandHandler {
    pub fn new(engine: QaEngine) -> Self {
        Self {
            engine,
            document: None,
        }
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<(), String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        match input.to_lowercase().as_str() {
            "help" => return self.show_help(),
            "info" => return self.show_info(),
            "exit" | "quit" => {
                println!("👋 Goodbye!");
                std::process::exit(0);
            }
            _ => {}
        }

        if let Some(path) = input.strip_prefix("load ") {
            return self.load_document(path.trim()).await;
        }

        let question = input.strip_prefix("ask ").unwrap_or(input).trim();
        self.ask(question).await
    }

    pub async fn load_document(&mut self, path: &str) -> Result<(), String> {
        println!("📄 Processing document: {}", path.bright_yellow());

        let text = document::extract_text_from_path(path).map_err(|e| e.to_string())?;
        let index = self
            .engine
            .index_document(&text)
            .await
            .map_err(|e| e.to_string())?;

        println!("{}", "✅ Document processed successfully!".green());
        println!(
            "📊 Document Statistics: {} words, {} segments",
            index.words.to_string().cyan(),
            index.segments.to_string().cyan()
        );

        self.document = Some(LoadedDocument {
            path: path.to_string(),
            doc_id: index.doc_id,
            words: index.words,
            segments: index.segments,
        });
        Ok(())
    }

    async fn ask(&self, question: &str) -> Result<(), String> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| "No document loaded. Use: load <pdf_path>".to_string())?;
        if question.is_empty() {
            return Err("Please provide a question. Usage: ask <question>".to_string());
        }

        let result = self
            .engine
            .ask(question, &doc.doc_id)
            .await
            .map_err(|e| e.to_string())?;

        println!("\n🤖 Answer:");
        println!("{}", result.answer.bright_green());

        println!("\n📑 Retrieved Segments:");
        println!("{}", result.context.truecolor(255, 236, 179));

        println!(
            "\n⏱️  Response time: {} | Retrieved: {} words",
            format!("{:.2}s", result.elapsed.as_secs_f64()).cyan(),
            result.context.split_whitespace().count().to_string().cyan()
        );
        println!();
        Ok(())
    }

    fn show_info(&self) -> Result<(), String> {
        match &self.document {
            Some(doc) => {
                println!("\n📄 Loaded Document:");
                println!("  Path:     {}", doc.path.bright_yellow());
                println!("  Id:       {}", doc.doc_id.cyan());
                println!("  Words:    {}", doc.words.to_string().cyan());
                println!("  Segments: {}", doc.segments.to_string().cyan());
                println!();
                Ok(())
            }
            None => Err("No document loaded. Use: load <pdf_path>".to_string()),
        }
    }

    fn show_help(&self) -> Result<(), String> {
        println!("\n📚 Document QA Commands:");
        println!("  load <pdf_path>  - Extract and index a PDF document");
        println!("  ask <question>   - Ask a question about the document");
        println!("  info             - Show the loaded document's statistics");
        println!();
        println!("  You can also just type a question directly.");
        println!();
        println!("⚙️ System Commands:");
        println!("  help  - Show this help menu");
        println!("  exit  - Exit the program");
        println!();
        Ok(())
    }
}
