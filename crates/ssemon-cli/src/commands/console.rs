//! Console command - interactive start/stop controls read from stdin

use std::io::{BufRead, BufReader};
use std::str::FromStr;
use std::thread;

use anyhow::Result;
use ssemon_client::{EventTransport, SseClient, StreamController};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::output::{OutputContext, TerminalDisplay};

const HELP: &str = "Commands: start, stop, log, help, quit";

/// A control typed at the console prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Log,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Ok(Self::Start),
            "stop" | "x" => Ok(Self::Stop),
            "log" | "l" => Ok(Self::Log),
            "help" | "h" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("Unknown command '{}'. {}", other, HELP)),
        }
    }
}

/// Input reaching the console loop
#[derive(Debug)]
enum Input {
    Line(String),
    Interrupt,
    Eof,
}

/// Run the interactive console until `quit`, end of input or Ctrl+C
pub async fn console(
    controller: &mut StreamController<SseClient, TerminalDisplay>,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(HELP);

    let (tx, mut rx) = mpsc::unbounded_channel();

    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Input::Interrupt);
    })?;

    spawn_line_reader(BufReader::new(std::io::stdin()), tx);

    run_console(controller, &mut rx, ctx).await;
    ctx.success("Bye");

    Ok(())
}

/// Forward lines from `reader` on a detached OS thread
///
/// A blocking read never holds up runtime shutdown; the thread is simply
/// abandoned when the process exits.
fn spawn_line_reader<R>(reader: R, tx: UnboundedSender<Input>)
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in reader.lines() {
            let input = match line {
                Ok(line) => Input::Line(line),
                Err(e) => {
                    debug!("stdin read failed: {}", e);
                    break;
                }
            };
            if tx.send(input).is_err() {
                return;
            }
        }
        let _ = tx.send(Input::Eof);
    });
}

/// Multiplex console input with the event stream; leaves the controller Idle
async fn run_console<T: EventTransport>(
    controller: &mut StreamController<T, TerminalDisplay>,
    rx: &mut UnboundedReceiver<Input>,
    ctx: &OutputContext,
) {
    loop {
        tokio::select! {
            input = rx.recv() => {
                let line = match input {
                    Some(Input::Line(line)) => line,
                    Some(Input::Interrupt) | Some(Input::Eof) | None => break,
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Start) => {
                        if controller.is_connected() {
                            ctx.info("Already receiving");
                        }
                        controller.start().await;
                    }
                    Ok(ConsoleCommand::Stop) => controller.stop(),
                    Ok(ConsoleCommand::Log) => controller.display().print_surface(),
                    Ok(ConsoleCommand::Help) => ctx.info(HELP),
                    Ok(ConsoleCommand::Quit) => break,
                    Err(message) => ctx.warn(&message),
                }
            }
            state = controller.process_next(), if controller.is_connected() => {
                debug!("Controller state: {:?}", state);
            }
        }
    }

    controller.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::time::{Duration, Instant};

    use ssemon_client::controller::{INFO_KIND, STOPPED_MESSAGE};
    use ssemon_client::testing::ScriptedTransport;
    use ssemon_client::{ControllerState, SseEvent};

    use crate::output::OutputFormat;

    fn quiet_ctx() -> OutputContext {
        OutputContext::new(OutputFormat::Json, true, true)
    }

    fn controller(
        transport: ScriptedTransport,
    ) -> StreamController<ScriptedTransport, TerminalDisplay> {
        StreamController::new(transport, TerminalDisplay::new(OutputFormat::Json, true))
    }

    fn kinds(controller: &StreamController<ScriptedTransport, TerminalDisplay>) -> Vec<String> {
        controller
            .display()
            .surface()
            .records()
            .map(|r| r.kind.clone())
            .collect()
    }

    fn line(text: &str) -> Input {
        Input::Line(text.to_string())
    }

    /// Reader whose first read blocks until its sender is dropped
    struct BlockedReader(std::sync::mpsc::Receiver<()>);

    impl Read for BlockedReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Start));
        assert_eq!(" STOP ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Stop));
        assert_eq!("l".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Log));
        assert_eq!("?".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Help));
        assert_eq!("exit".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_unknown_command_lists_help() {
        let err = "restart".parse::<ConsoleCommand>().unwrap_err();
        assert!(err.contains("restart"));
        assert!(err.contains(HELP));
    }

    #[test]
    fn test_line_reader_forwards_lines_then_eof() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        spawn_line_reader(Cursor::new("start\r\n\nquit\n"), tx);

        let mut received = Vec::new();
        while let Some(input) = rx.blocking_recv() {
            received.push(format!("{:?}", input));
        }
        assert_eq!(
            received,
            vec![
                "Line(\"start\")".to_string(),
                "Line(\"\")".to_string(),
                "Line(\"quit\")".to_string(),
                "Eof".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_then_stop_renders_events_and_info() {
        let transport = ScriptedTransport::new(vec![
            SseEvent::message("hello"),
            SseEvent::named("sensor-data", "{\"temp\":21}"),
        ])
        .hold_open();
        let mut controller = controller(transport);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = quiet_ctx();

        let driver = async {
            tx.send(line("start")).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(line("stop")).unwrap();
            tx.send(line("quit")).unwrap();
        };
        tokio::join!(run_console(&mut controller, &mut rx, &ctx), driver);

        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(kinds(&controller), vec!["info", "sensor-data", "message"]);
        assert_eq!(controller.transport().opened(), 1);
    }

    #[tokio::test]
    async fn test_quit_while_connected_stops_stream() {
        let transport = ScriptedTransport::new(vec![]).hold_open();
        let mut controller = controller(transport);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = quiet_ctx();

        tx.send(line("start")).unwrap();
        tx.send(line("bogus")).unwrap();
        tx.send(line("quit")).unwrap();

        // tx stays alive: only the quit command may end the loop
        tokio::time::timeout(
            Duration::from_secs(2),
            run_console(&mut controller, &mut rx, &ctx),
        )
        .await
        .expect("console loop did not return after quit");

        assert_eq!(controller.state(), ControllerState::Idle);
        let latest = controller.display().surface().latest().unwrap();
        assert_eq!(latest.kind, INFO_KIND);
        assert_eq!(latest.body, STOPPED_MESSAGE);
        drop(tx);
    }

    #[tokio::test]
    async fn test_interrupt_ends_loop() {
        let transport = ScriptedTransport::new(vec![]).hold_open();
        let mut controller = controller(transport);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = quiet_ctx();

        tx.send(line("start")).unwrap();
        tx.send(Input::Interrupt).unwrap();

        tokio::time::timeout(
            Duration::from_secs(2),
            run_console(&mut controller, &mut rx, &ctx),
        )
        .await
        .expect("console loop did not return after interrupt");

        assert!(!controller.is_connected());
        drop(tx);
    }

    #[tokio::test]
    async fn test_end_of_input_ends_loop() {
        let mut controller = controller(ScriptedTransport::new(vec![]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = quiet_ctx();

        spawn_line_reader(Cursor::new("help\n"), tx);

        tokio::time::timeout(
            Duration::from_secs(2),
            run_console(&mut controller, &mut rx, &ctx),
        )
        .await
        .expect("console loop did not return at end of input");

        assert!(controller.display().surface().is_empty());
    }

    #[test]
    fn test_blocked_stdin_does_not_hold_up_shutdown() {
        let (unblock_tx, unblock_rx) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let mut controller = controller(ScriptedTransport::new(vec![]).hold_open());
            let (tx, mut rx) = mpsc::unbounded_channel();
            let ctx = quiet_ctx();

            spawn_line_reader(BufReader::new(BlockedReader(unblock_rx)), tx.clone());
            tx.send(line("start")).unwrap();
            tx.send(line("quit")).unwrap();

            run_console(&mut controller, &mut rx, &ctx).await;
            assert!(!controller.is_connected());
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(unblock_tx);
    }
}
