//! Entity-set extraction from `@odata.context` URLs

/// Resolve the entity-set name of an `@odata.context` URL.
///
/// `https://org/api/data/v9.2/$metadata#accounts(name,accountid)` resolves to `accounts`.
/// Returns `None` for empty input, input without a `#` fragment, or an empty name.
pub fn entity_set_name(context: Option<&str>) -> Option<&str> {
    let context = context?;
    let (_, fragment) = context.split_once('#')?;
    let name = match fragment.find('(') {
        Some(end) => &fragment[..end],
        None => fragment,
    };

    if name.is_empty() { None } else { Some(name) }
}
