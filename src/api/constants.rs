//! API Constants for the Dynamics 365 / Dataverse Web API

/// Default Web API path appended to the organisation host
pub const DEFAULT_API_SUFFIX: &str = "api/data/v9.2/";

/// Batch endpoint for multi-operation requests
pub const BATCH_ENDPOINT: &str = "$batch";

/// Content type for batch requests
pub const BATCH_CONTENT_TYPE: &str = "multipart/mixed";

/// Content type of a single part inside a batch
pub const PART_CONTENT_TYPE: &str = "application/http";

/// Default identity provider authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Safety margin subtracted from every provider-declared token expiry
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 5 * 60;

/// Standard headers for Dynamics 365 requests
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// OData version header value (used for both version headers)
    pub const ODATA_VERSION: &str = "4.0";

    pub const ODATA_VERSION_HEADER: &str = "OData-Version";
    pub const ODATA_MAX_VERSION_HEADER: &str = "OData-MaxVersion";

    /// Response header carrying the URL of a created record
    pub const ODATA_ENTITY_ID: &str = "OData-EntityId";

    pub const PREFER: &str = "Prefer";
    pub const CONTENT_ID: &str = "Content-ID";
    pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

    /// Prefer header for returning representation
    pub const PREFER_RETURN_REPRESENTATION: &str = "return=representation";

    /// Prefer header asking for every annotation (formatted values, lookups, ...)
    pub const PREFER_INCLUDE_ANNOTATIONS: &str = "odata.include-annotations=\"*\"";

    /// If-Match header for updates (any version)
    pub const IF_MATCH_ANY: &str = "*";
}

/// Build the path of a single record: `<set>(<key>)`
pub fn record_path(entity_set: &str, key: &str) -> String {
    format!("{}({})", entity_set, key)
}

/// Build the `$ref` path used to associate two records
pub fn reference_path(parent: &str, navigation_property: &str) -> String {
    format!("{}/{}/$ref", parent, navigation_property)
}

/// Build the `$ref` path used to disassociate two records.
///
/// Collection-valued navigation properties need the related key, single-valued ones don't.
pub fn disassociate_path(
    parent: &str,
    navigation_property: &str,
    related_key: Option<&str>,
) -> String {
    match related_key {
        Some(key) => format!("{}/{}({})/$ref", parent, navigation_property, key),
        None => reference_path(parent, navigation_property),
    }
}

/// Join the organisation host, the API suffix and a relative path into an absolute URL
pub fn absolute_url(base_url: &str, api_suffix: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let suffix = api_suffix.trim_matches('/');
    let path = path.trim_start_matches('/');
    if suffix.is_empty() {
        format!("{}/{}", base, path)
    } else {
        format!("{}/{}/{}", base, suffix, path)
    }
}
