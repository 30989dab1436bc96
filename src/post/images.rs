//! Model review of candidate images. A relevance pass runs over chunks of
//! ten, then a ranking pass over chunks of five. Chunks are sent
//! concurrently and results are stitched back in candidate order.

use crate::llm::ChatModel;
use crate::llm::structured::extract_tagged;
use futures_util::future::join_all;

pub const VALIDATE_CHUNK_SIZE: usize = 10;
pub const RERANK_CHUNK_SIZE: usize = 5;

/// Numbers a chunk from zero, one image per line.
fn index_listing(chunk: &[String]) -> String {
    chunk
        .iter()
        .enumerate()
        .map(|(i, url)| format!("Image {i}: {url}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comma separated indices inside `<tag>`. Entries that are not numbers are
/// skipped; `None` when the tag is missing.
pub fn parse_indices(reply: &str, tag: &str) -> Option<Vec<usize>> {
    let inner = extract_tagged(reply, tag)?;
    Some(
        inner
            .split(',')
            .filter_map(|entry| entry.trim().parse().ok())
            .collect(),
    )
}

/// Keeps the candidates the model marks as relevant to the post.
///
/// A chunk whose call fails or whose reply has no index list is dropped
/// whole. Candidate order is preserved.
pub async fn validate_images(
    candidates: &[String],
    model: &ChatModel,
    system_prompt: &str,
) -> Vec<String> {
    let chunks: Vec<&[String]> = candidates.chunks(VALIDATE_CHUNK_SIZE).collect();
    let verdicts = join_all(
        chunks
            .iter()
            .enumerate()
            .map(|(n, chunk)| validate_chunk(n, chunk, model, system_prompt)),
    )
    .await;

    chunks
        .into_iter()
        .zip(verdicts)
        .flat_map(|(chunk, keep)| {
            chunk
                .iter()
                .enumerate()
                .filter(move |(i, _)| keep.contains(i))
                .map(|(_, url)| url.clone())
        })
        .collect()
}

async fn validate_chunk(
    n: usize,
    chunk: &[String],
    model: &ChatModel,
    system_prompt: &str,
) -> Vec<usize> {
    let reply = match model.invoke(system_prompt, &index_listing(chunk)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(chunk = n, images = chunk.len(), error = %e, "dropping image chunk: validation failed");
            return Vec::new();
        }
    };
    match parse_indices(&reply, "relevant_indices") {
        Some(indices) => indices,
        None => {
            tracing::warn!(chunk = n, images = chunk.len(), "dropping image chunk: no index list in reply");
            Vec::new()
        }
    }
}

/// Orders images by how well they fit the post.
///
/// Every chunk must come back as a permutation of its own indices. If any
/// chunk fails or the merged ranking does not cover every image, the
/// original order is kept.
pub async fn rerank_images(
    images: Vec<String>,
    model: &ChatModel,
    system_prompt: &str,
) -> Vec<String> {
    if images.len() < 2 {
        return images;
    }

    let chunks: Vec<&[String]> = images.chunks(RERANK_CHUNK_SIZE).collect();
    let rankings = join_all(
        chunks
            .iter()
            .enumerate()
            .map(|(n, chunk)| rerank_chunk(n, chunk, model, system_prompt)),
    )
    .await;

    let mut ranked = Vec::with_capacity(images.len());
    for (chunk, ranking) in chunks.iter().zip(rankings) {
        let Some(order) = ranking else { break };
        ranked.extend(order.into_iter().map(|i| chunk[i].clone()));
    }

    if ranked.len() == images.len() {
        ranked
    } else {
        tracing::warn!(
            images = images.len(),
            ranked = ranked.len(),
            "image ranking incomplete; keeping original order"
        );
        images
    }
}

async fn rerank_chunk(
    n: usize,
    chunk: &[String],
    model: &ChatModel,
    system_prompt: &str,
) -> Option<Vec<usize>> {
    let reply = match model.invoke(system_prompt, &index_listing(chunk)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(chunk = n, error = %e, "image ranking failed");
            return None;
        }
    };
    let order = parse_indices(&reply, "reranked_indices")?;
    is_permutation(&order, chunk.len()).then_some(order)
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    let mut seen = vec![false; len];
    order.len() == len
        && order
            .iter()
            .all(|&i| i < len && !std::mem::replace(&mut seen[i], true))
}
