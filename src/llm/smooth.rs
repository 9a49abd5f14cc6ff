// Re-chunks provider deltas into whole words

use futures::StreamExt;
use futures::stream;
use std::time::Duration;

use super::TokenStream;

struct SmoothState {
    inner: TokenStream,
    buffer: String,
    finished: bool,
}

pub fn smooth_words(inner: TokenStream, delay: Duration) -> TokenStream {
    let state = SmoothState {
        inner,
        buffer: String::new(),
        finished: false,
    };

    let smoothed = stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(word) = take_word(&mut state.buffer) {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                return Some((Ok(word), state));
            }

            if state.finished {
                if state.buffer.is_empty() {
                    return None;
                }
                let tail = std::mem::take(&mut state.buffer);
                return Some((Ok(tail), state));
            }

            match state.inner.next().await {
                Some(Ok(delta)) => state.buffer.push_str(&delta),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((Err(e), state));
                }
                None => state.finished = true,
            }
        }
    });

    Box::pin(smoothed)
}

// First `\S+\s+` match, including anything before it. None until a word is
// terminated by whitespace.
fn take_word(buffer: &mut String) -> Option<String> {
    let word_start = buffer.find(|c: char| !c.is_whitespace())?;
    let ws_rel = buffer[word_start..].find(char::is_whitespace)?;
    let ws_start = word_start + ws_rel;
    let end = buffer[ws_start..]
        .find(|c: char| !c.is_whitespace())
        .map(|rel| ws_start + rel)
        .unwrap_or(buffer.len());

    let rest = buffer.split_off(end);
    Some(std::mem::replace(buffer, rest))
}
