//! Per-request evaluation diagnostics

/// The reason an evaluation produced no CORS grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No origin was sent, or no group's origin rule matched it
    NoOriginMatch,
    /// An origin rule matched, but no resource in its group matched the path
    NoPathMatch,
    /// A preflight request carried no `Access-Control-Request-Method` header
    NoMethodHeader,
    /// The preflight method is not in the resource's allowed methods
    MethodNotAllowed,
    /// A preflight request header is not in the resource's allowed headers
    HeaderNotAllowed,
}

/// A diagnostic record of a single CORS evaluation.
///
/// The engine attaches one to the response
/// [`Extensions`](crate::http::Extensions) after every evaluation, so
/// observability tooling can inspect the outcome once the call completes:
///
/// ```no_run
/// use cors_gate::{CorsResult, HttpResponse};
///
/// # fn docs(response: HttpResponse) {
/// if let Some(result) = response.extensions().get::<CorsResult>() {
///     println!("hit: {}, preflight: {}", result.is_hit(), result.is_preflight());
/// }
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorsResult {
    preflight: bool,
    hit: bool,
    miss_reason: Option<MissReason>,
}

impl CorsResult {
    /// Records a successful evaluation
    #[inline]
    pub(crate) fn hit(preflight: bool) -> Self {
        Self { preflight, hit: true, miss_reason: None }
    }

    /// Records a failed evaluation with the given reason
    #[inline]
    pub(crate) fn miss(preflight: bool, reason: MissReason) -> Self {
        Self { preflight, hit: false, miss_reason: Some(reason) }
    }

    /// Returns `true` if a resource matched and headers were computed
    #[inline]
    pub fn is_hit(&self) -> bool {
        self.hit
    }

    /// Returns `true` if the request was classified as a preflight
    #[inline]
    pub fn is_preflight(&self) -> bool {
        self.preflight
    }

    /// Returns the miss reason, or `None` on a hit
    #[inline]
    pub fn miss_reason(&self) -> Option<MissReason> {
        self.miss_reason
    }
}
