//! Recognition engine reading a dictated line from the terminal.
//!
//! Works with any OS-level dictation tool that types into the focused
//! terminal, or plain typing.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{Mutex, Notify};

use super::RecognitionEngine;

pub struct ConsoleRecognition<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
    stop: Notify,
}

impl ConsoleRecognition {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsoleRecognition<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            stop: Notify::new(),
        }
    }
}

#[async_trait]
impl<R> RecognitionEngine for ConsoleRecognition<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self) -> Result<String, String> {
        let mut lines = self.lines.lock().await;
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => Err("no-speech".to_string()),
                Ok(Some(line)) => Ok(line.trim().to_string()),
                Ok(None) => Err("end of input".to_string()),
                Err(e) => Err(e.to_string()),
            },
            _ = self.stop.notified() => Err("aborted".to_string()),
        }
    }

    fn stop(&self) {
        self.stop.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reads_one_line_per_call() {
        let input: &[u8] = b"  turn on the lights \nwhat time is it\n";
        let engine = ConsoleRecognition::from_reader(BufReader::new(input));
        assert!(engine.is_available());
        assert_eq!(engine.recognize().await.unwrap(), "turn on the lights");
        assert_eq!(engine.recognize().await.unwrap(), "what time is it");
        assert_eq!(engine.recognize().await.unwrap_err(), "end of input");
    }

    #[tokio::test]
    async fn test_blank_line_is_no_speech() {
        let input: &[u8] = b"   \n";
        let engine = ConsoleRecognition::from_reader(BufReader::new(input));
        assert_eq!(engine.recognize().await.unwrap_err(), "no-speech");
    }

    #[tokio::test]
    async fn test_stop_aborts_pending_read() {
        let (_writer, reader) = tokio::io::duplex(64);
        let engine = Arc::new(ConsoleRecognition::from_reader(BufReader::new(reader)));

        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.recognize().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.stop();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.unwrap_err(), "aborted");
    }
}
