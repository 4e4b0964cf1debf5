use serde_json::{Value, to_string_pretty};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use toolwire_core::application::poller::{PollHandle, spawn_poller};
use toolwire_core::application::resolver;
use toolwire_core::{
    ActionEngine, ActionKind, DispatchOutcome, FieldKind, Params, PendingFile, ToolDefinition,
};
use toolwire_session::FileConversationStore;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum LoopControl {
    Continue,
    Exit,
}

struct Shell {
    engine: Arc<ActionEngine>,
    storage: Arc<FileConversationStore>,
    watch: Option<PollHandle>,
}

pub async fn run(
    engine: Arc<ActionEngine>,
    storage: Arc<FileConversationStore>,
) -> Result<(), StdioError> {
    let mut stdout = io::stdout();
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut shell = Shell {
        engine,
        storage,
        watch: None,
    };

    write_line(&mut stdout, "toolwire - tapez /help pour la liste des commandes.").await?;
    loop {
        prompt(&mut stdout, &shell).await?;
        let Some(line) = lines.next_line().await? else {
            write_line(&mut stdout, "\nEntrée fermée. Au revoir.").await?;
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.starts_with('/') {
            match handle_command(input, &mut shell, &mut stdout).await? {
                LoopControl::Continue => continue,
                LoopControl::Exit => break,
            }
        } else {
            handle_prompt(&shell, input.to_string(), &mut stdout).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}

async fn prompt(stdout: &mut io::Stdout, shell: &Shell) -> Result<(), StdioError> {
    let tool = shell.engine.active_tool().unwrap_or_else(|| "-".to_string());
    stdout.write_all(format!("{tool}> ").as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

async fn write_line(stdout: &mut io::Stdout, text: &str) -> Result<(), StdioError> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    Ok(())
}

/// First conversation action the tool has an endpoint for.
fn conversation_action(tool: &ToolDefinition) -> Option<ActionKind> {
    ActionKind::ALL
        .into_iter()
        .filter(|kind| kind.enters_conversation())
        .find(|kind| resolver::resolve(tool, *kind).is_ok())
}

/// Runs the prompt in the background so `/stop` stays available.
async fn handle_prompt(
    shell: &Shell,
    text: String,
    stdout: &mut io::Stdout,
) -> Result<(), StdioError> {
    let Some(tool_id) = shell.engine.active_tool() else {
        write_line(stdout, "Aucun outil actif. Utilisez /tool <id>.").await?;
        return Ok(());
    };
    let Some(kind) = shell
        .engine
        .catalog()
        .get(&tool_id)
        .and_then(|tool| conversation_action(&tool))
    else {
        write_line(stdout, "Cet outil n'accepte pas de message. Utilisez /run <action>.").await?;
        return Ok(());
    };

    if !shell.engine.set_input(&tool_id, text) {
        write_line(stdout, "Cet outil n'accepte pas de texte. Utilisez /run <action>.").await?;
        return Ok(());
    }
    info!(tool = tool_id.as_str(), action = %kind, "Processing STDIO prompt");
    let engine = shell.engine.clone();
    tokio::spawn(async move {
        if let Err(err) = engine.dispatch(&tool_id, kind, Params::new()).await {
            eprintln!("{}", err.user_message());
        }
    });
    Ok(())
}

async fn handle_command(
    input: &str,
    shell: &mut Shell,
    stdout: &mut io::Stdout,
) -> Result<LoopControl, StdioError> {
    let command = input.trim_start_matches('/');
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));
    let name = name.to_ascii_lowercase();
    debug!(command = %name, "Processing STDIO command");

    let engine = shell.engine.clone();
    let active = engine.active_tool();
    match name.as_str() {
        "help" | "?" => print_help(stdout).await?,
        "quit" | "exit" | "q" => {
            write_line(stdout, "Au revoir.").await?;
            return Ok(LoopControl::Exit);
        }
        "tools" => {
            for tool in engine.catalog().iter() {
                let marker = if active.as_deref() == Some(tool.id.as_str()) { "*" } else { " " };
                write_line(stdout, &format!("{marker} {} - {}", tool.id, tool.label)).await?;
            }
        }
        "tool" => {
            if rest.is_empty() {
                show_tool(stdout, &engine, active.as_deref()).await?;
            } else if engine.activate(rest) {
                show_tool(stdout, &engine, Some(rest)).await?;
            } else {
                write_line(stdout, &format!("Outil « {rest} » inconnu.")).await?;
            }
        }
        "set" => {
            let Some(tool_id) = active else {
                write_line(stdout, "Aucun outil actif.").await?;
                return Ok(LoopControl::Continue);
            };
            let Some((field, raw)) = rest.split_once(char::is_whitespace) else {
                write_line(stdout, "Usage : /set <champ> <valeur>").await?;
                return Ok(LoopControl::Continue);
            };
            let value = serde_json::from_str(raw.trim())
                .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
            match engine.select(&tool_id, field, value).await {
                Ok(Some(reply)) => print_value(stdout, &reply).await?,
                Ok(None) => write_line(stdout, &format!("{field} mis à jour.")).await?,
                Err(err) => write_line(stdout, &err.user_message()).await?,
            }
        }
        "options" => {
            let Some(tool_id) = active else {
                write_line(stdout, "Aucun outil actif.").await?;
                return Ok(LoopControl::Continue);
            };
            match engine.initialize_options(&tool_id, rest).await {
                Ok(options) if options.is_empty() => {
                    write_line(stdout, "Aucune option disponible.").await?
                }
                Ok(options) => {
                    for option in options {
                        write_line(stdout, &format!("- {} ({})", option.label, option.value))
                            .await?;
                    }
                }
                Err(err) => write_line(stdout, &err.user_message()).await?,
            }
        }
        "attach" => {
            let Some(tool_id) = active else {
                write_line(stdout, "Aucun outil actif.").await?;
                return Ok(LoopControl::Continue);
            };
            match read_attachment(Path::new(rest)).await {
                Ok(file) => {
                    let name = file.name.clone();
                    if engine.add_pending_file(&tool_id, file) {
                        write_line(stdout, &format!("Fichier « {name} » joint.")).await?;
                    } else {
                        write_line(stdout, "Cet outil n'accepte pas de fichiers.").await?;
                    }
                }
                Err(err) => write_line(stdout, &format!("Lecture impossible : {err}")).await?,
            }
        }
        "run" => {
            let Some(tool_id) = active else {
                write_line(stdout, "Aucun outil actif.").await?;
                return Ok(LoopControl::Continue);
            };
            let (action, raw_params) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(action, params)| (action, params.trim()));
            let Ok(kind) = action.parse::<ActionKind>() else {
                write_line(stdout, &format!("Action « {action} » inconnue.")).await?;
                return Ok(LoopControl::Continue);
            };
            let params = match parse_params(raw_params) {
                Some(params) => params,
                None => {
                    write_line(stdout, "Les paramètres doivent être un objet JSON.").await?;
                    return Ok(LoopControl::Continue);
                }
            };
            match engine.dispatch(&tool_id, kind, params).await {
                Ok(DispatchOutcome::Executed(value)) => print_value(stdout, &value).await?,
                Ok(_) => {}
                Err(err) => write_line(stdout, &err.user_message()).await?,
            }
        }
        "stop" => {
            let Some(tool_id) = active else {
                return Ok(LoopControl::Continue);
            };
            match engine.dispatch(&tool_id, ActionKind::Stop, Params::new()).await {
                Ok(_) => write_line(stdout, "Arrêt demandé.").await?,
                Err(err) => write_line(stdout, &err.user_message()).await?,
            }
        }
        "watch" => {
            let Some(tool_id) = active else {
                write_line(stdout, "Aucun outil actif.").await?;
                return Ok(LoopControl::Continue);
            };
            let mut parts = rest.split_whitespace();
            let kind = parts.next().and_then(|value| value.parse::<ActionKind>().ok());
            let every = parts.next().and_then(|value| value.parse::<u64>().ok()).unwrap_or(5);
            let Some(kind) = kind else {
                write_line(stdout, "Usage : /watch <action> [secondes]").await?;
                return Ok(LoopControl::Continue);
            };
            shell.watch = Some(spawn_poller(
                engine.clone(),
                tool_id,
                kind,
                Duration::from_secs(every.max(1)),
                move |result| {
                    if let Ok(value) = result {
                        println!("[{kind}] {value}");
                    }
                },
            ));
            write_line(stdout, &format!("Actualisation de {kind} toutes les {every} s.")).await?;
        }
        "unwatch" => {
            if let Some(handle) = shell.watch.take() {
                handle.stop();
            }
        }
        "new" => {
            engine.new_conversation();
            write_line(stdout, "Nouvelle conversation.").await?;
        }
        "history" => match shell.storage.list_conversations().await {
            Ok(summaries) if summaries.is_empty() => {
                write_line(stdout, "Aucune conversation enregistrée.").await?
            }
            Ok(summaries) => {
                for summary in summaries {
                    write_line(
                        stdout,
                        &format!(
                            "{}  {}  [{}] {} ({} messages)",
                            summary.id,
                            summary.updated_at.format("%Y-%m-%d %H:%M"),
                            summary.tool_id,
                            summary.title,
                            summary.message_count
                        ),
                    )
                    .await?;
                }
            }
            Err(err) => write_line(stdout, &err.user_message()).await?,
        },
        "open" => match engine.open_conversation(rest).await {
            Ok(_) => {
                for message in engine.messages() {
                    write_line(stdout, &format!("{}: {}", message.role.as_str(), message.content))
                        .await?;
                }
            }
            Err(err) => write_line(stdout, &err.user_message()).await?,
        },
        "delete" => match engine.delete_conversation(rest).await {
            Ok(()) => write_line(stdout, "Conversation supprimée.").await?,
            Err(err) => write_line(stdout, &err.user_message()).await?,
        },
        "metrics" => {
            let snapshot = engine.metrics();
            write_line(stdout, &format!("{snapshot:#?}")).await?;
        }
        other => {
            write_line(
                stdout,
                &format!("Commande « {other} » inconnue. Tapez /help."),
            )
            .await?;
        }
    }
    Ok(LoopControl::Continue)
}

fn parse_params(raw: &str) -> Option<Params> {
    if raw.is_empty() {
        return Some(Params::new());
    }
    match serde_json::from_str(raw) {
        Ok(Value::Object(params)) => Some(params),
        _ => None,
    }
}

async fn read_attachment(path: &Path) -> std::io::Result<PendingFile> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("fichier")
        .to_string();
    Ok(PendingFile::new(name, mime_for(path), bytes))
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("txt" | "md") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

async fn show_tool(
    stdout: &mut io::Stdout,
    engine: &ActionEngine,
    tool_id: Option<&str>,
) -> Result<(), StdioError> {
    let Some(tool) = tool_id.and_then(|id| engine.catalog().get(id)) else {
        write_line(stdout, "Aucun outil actif.").await?;
        return Ok(());
    };
    let Some(state) = engine.tool_state(&tool.id) else {
        return Ok(());
    };
    write_line(stdout, &format!("{} ({})", tool.label, tool.id)).await?;
    for field in &tool.fields {
        let value = state
            .config
            .get(&field.name)
            .map_or_else(|| "-".to_string(), Value::to_string);
        let required = if field.required { " *" } else { "" };
        let hint = if field.kind == FieldKind::Choice && field.options_action.is_some() {
            format!("  (/options {})", field.name)
        } else {
            String::new()
        };
        write_line(
            stdout,
            &format!("  {}{required} = {value}{hint}", field.label),
        )
        .await?;
        if let Some(error) = state.errors.get(&field.name) {
            write_line(stdout, &format!("    ! {error}")).await?;
        }
    }
    if !state.pending_files.is_empty() {
        write_line(
            stdout,
            &format!("  {} fichier(s) en attente", state.pending_files.len()),
        )
        .await?;
    }
    Ok(())
}

async fn print_value(stdout: &mut io::Stdout, value: &Value) -> Result<(), StdioError> {
    let text = match value {
        Value::String(text) => text.clone(),
        other => to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    write_line(stdout, &text).await
}

async fn print_help(stdout: &mut io::Stdout) -> Result<(), StdioError> {
    const HELP: &[&str] = &[
        "Commandes :",
        "  /tools                  liste les outils",
        "  /tool [id]              active un outil ou affiche l'outil actif",
        "  /set <champ> <valeur>   modifie un champ de configuration",
        "  /options <champ>        charge les choix d'un champ",
        "  /attach <chemin>        joint un fichier au prochain message",
        "  /run <action> [json]    exécute une action",
        "  /stop                   interrompt la génération en cours",
        "  /watch <action> [s]     exécute une action périodiquement",
        "  /unwatch                arrête l'actualisation",
        "  /new                    démarre une nouvelle conversation",
        "  /history                liste les conversations enregistrées",
        "  /open <id>              rouvre une conversation",
        "  /delete <id>            supprime une conversation",
        "  /metrics                compteurs du moteur",
        "  /quit                   quitte",
        "Tout autre texte est envoyé à l'outil actif.",
    ];
    for line in HELP {
        write_line(stdout, line).await?;
    }
    Ok(())
}
