use std::future::Future;

use crate::error::GatewayError;

/// Fetch items for `ids` in contiguous chunks of at most `chunk_size`, one chunk at a time.
///
/// Results are concatenated in input order. An empty `ids` slice makes no call.
pub async fn for_each_chunk<I, T, F, Fut>(
    ids: &[I],
    chunk_size: usize,
    mut fetch_chunk: F,
) -> Result<Vec<T>, GatewayError>
where
    I: Clone,
    F: FnMut(Vec<I>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, GatewayError>>,
{
    let mut items = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(chunk_size.max(1)) {
        let fetched = fetch_chunk(chunk.to_vec()).await?;
        items.extend(fetched);
    }
    Ok(items)
}
