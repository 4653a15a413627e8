//! LibXML2 FFI Wrapper Module
//!
//! Safe wrapper around the libxml2 calls needed to compile an XML Schema set
//! and to validate an in-memory document against it.
//!
//! ## Why direct FFI
//!
//! The Rust ecosystem has no mature runtime XSD validator. `roxmltree`,
//! `quick-xml` and `xml-rs` parse but do not validate, and the `libxml` crate
//! still links the system library while hiding the structured error channel we
//! need for line/column reporting. Direct FFI keeps full control over error
//! routing and resource cleanup.
//!
//! ## Error routing
//!
//! A validation run has two diagnostic sources:
//!
//! - **Validity errors** raised by the schema validator. They arrive through
//!   `xmlSchemaSetValidStructuredErrors` on the per-run validation context.
//! - **Well-formedness errors** raised by the XML parser that drives the
//!   validator. The parser created inside `xmlSchemaValidateStream` has no
//!   handler of its own, so libxml2 falls back to the thread-local structured
//!   error function. [`StructuredErrorGuard`] installs it for the duration of
//!   one call and always resets it.
//!
//! Both sources feed the same [`ErrorCollector`], so events keep the order in
//! which libxml2 raised them.
//!
//! ## Thread Safety
//!
//! - **Schema parsing** must be serialized (libxml2's schema parser is not
//!   thread-safe). The server compiles its schema set exactly once.
//! - **Validation** is thread-safe as long as every run uses its own
//!   validation context, which [`LibXml2Wrapper::validate_memory`] guarantees.
//! - **Compiled schemas** are read-only after parsing and shared via `Arc`.

use std::marker::PhantomData;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_void};

use crate::collector::ErrorCollector;
use crate::error::{LibXml2Error, LibXml2Result};
use crate::result::Severity;

/// Global initialization flag for libxml2
static LIBXML2_INIT: Once = Once::new();

/// `XML_CHAR_ENCODING_NONE`: let the parser detect the encoding
const XML_CHAR_ENCODING_NONE: c_int = 0;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserInputBuffer {
    _private: [u8; 0],
}

/// Mirror of libxml2's `xmlError`
#[repr(C)]
pub struct XmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    /// Column number for parser and validator errors, 0 when unknown
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *const XmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);

    // Schema parsing functions
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;

    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );

    pub fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation functions
    pub fn xmlSchemaNewValidCtxt(schema: *mut XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);

    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );

    pub fn xmlParserInputBufferCreateMem(
        mem: *const c_char,
        size: c_int,
        enc: c_int,
    ) -> *mut XmlParserInputBuffer;

    pub fn xmlSchemaValidateStream(
        ctxt: *mut XmlSchemaValidCtxt,
        input: *mut XmlParserInputBuffer,
        enc: c_int,
        sax: *mut c_void,
        user_data: *mut c_void,
    ) -> c_int;
}

/// Read the trimmed message out of an `xmlError`
///
/// # Safety
///
/// `error` must be null or point to a live `xmlError`.
unsafe fn error_message(error: *const XmlError) -> Option<String> {
    if error.is_null() {
        return None;
    }
    let msg_ptr = unsafe { (*error).message };
    if msg_ptr.is_null() {
        return Some(String::new());
    }
    let c_str = unsafe { std::ffi::CStr::from_ptr(msg_ptr) };
    Some(c_str.to_string_lossy().trim().to_string())
}

/// libxml2 positions are 1-based with 0 meaning unknown; the collector
/// expects a negative value for unknown.
fn collector_position(raw: c_int) -> i32 {
    if raw > 0 { raw } else { -1 }
}

/// Per-run target of [`collect_structured_error`]
struct ErrorSink<'a> {
    collector: &'a mut ErrorCollector,
    fatal_reported: bool,
}

/// Callback feeding validation and well-formedness errors into an [`ErrorCollector`]
///
/// Nothing is delivered after the first fatal error; older libxml2 releases
/// keep parsing past it.
unsafe extern "C" fn collect_structured_error(user_data: *mut c_void, error: *const XmlError) {
    if user_data.is_null() {
        return;
    }
    let sink = unsafe { &mut *(user_data as *mut ErrorSink<'_>) };
    if sink.fatal_reported {
        return;
    }

    if let Some(message) = unsafe { error_message(error) } {
        let (level, line, column) = unsafe { ((*error).level, (*error).line, (*error).int2) };
        let severity = Severity::from_level(level);
        sink.collector.record(
            severity,
            message,
            collector_position(line),
            collector_position(column),
        );
        sink.fatal_reported = severity == Severity::FatalError;
    }
}

/// Callback capturing schema compilation diagnostics as plain strings
unsafe extern "C" fn collect_schema_diagnostic(user_data: *mut c_void, error: *const XmlError) {
    if user_data.is_null() {
        return;
    }
    let diagnostics = unsafe { &mut *(user_data as *mut Vec<String>) };

    if let Some(message) = unsafe { error_message(error) } {
        let level = unsafe { (*error).level };
        diagnostics.push(format!("{}: {}", Severity::from_level(level), message));
    }
}

/// Installs the thread-local structured error handler and resets it on drop
struct StructuredErrorGuard {
    _not_send: PhantomData<*mut c_void>,
}

impl StructuredErrorGuard {
    /// # Safety
    ///
    /// `ctx` must stay valid, and match what `handler` expects, until the
    /// guard is dropped. The guard must be dropped on the installing thread.
    unsafe fn install(ctx: *mut c_void, handler: XmlStructuredErrorFunc) -> Self {
        unsafe { xmlSetStructuredErrorFunc(ctx, handler) };
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for StructuredErrorGuard {
    fn drop(&mut self) {
        unsafe { xmlSetStructuredErrorFunc(std::ptr::null_mut(), None) };
    }
}

/// Thread-safe wrapper for a compiled libxml2 schema
///
/// - The schema is freed exactly once, when the last clone is dropped
/// - The schema can be shared across threads (read-only after parsing)
#[derive(Debug)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// The pointer must come from `xmlSchemaParse` and nothing else may free it.
    pub(crate) unsafe fn from_raw(ptr: *mut XmlSchema) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed {
                diagnostics: Vec::new(),
            });
        }

        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    /// Raw pointer for FFI calls, valid while `self` lives
    pub(crate) fn as_ptr(&self) -> *mut XmlSchema {
        self.inner.ptr
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.ptr.is_null()
    }
}

impl Clone for XmlSchemaPtr {
    fn clone(&self) -> Self {
        XmlSchemaPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// How a completed streaming validation ended, per libxml2's return code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Return code 0
    Valid,
    /// Return code > 0, or -1 after a fatal well-formedness error
    Invalid { code: i32 },
}

impl EngineStatus {
    /// Classify libxml2's return code.
    ///
    /// A document that is not well-formed makes the parse return -1, which
    /// is a content verdict only when the parser reported a fatal error.
    /// Any other negative code is an engine failure.
    pub fn from_code(code: c_int, fatal_reported: bool) -> LibXml2Result<Self> {
        match code {
            0 => Ok(EngineStatus::Valid),
            n if n > 0 || fatal_reported => Ok(EngineStatus::Invalid { code: n }),
            n => Err(LibXml2Error::InternalError { code: n }),
        }
    }
}

/// Safe access to the libxml2 schema compiler and streaming validator
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Initializes libxml2 on first use; safe to call repeatedly.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile an XML schema held in memory.
    ///
    /// **Not thread-safe in libxml2.** Callers compile once and share the result.
    ///
    /// # Errors
    ///
    /// `SchemaParseFailed` with every diagnostic libxml2 raised when the
    /// schema (or anything it imports) cannot be compiled.
    pub fn parse_schema_from_memory(&self, schema_data: &[u8]) -> LibXml2Result<XmlSchemaPtr> {
        let size = c_int::try_from(schema_data.len()).map_err(|_| LibXml2Error::DocumentTooLarge {
            size: schema_data.len(),
        })?;

        let mut diagnostics: Vec<String> = Vec::new();
        let diagnostics_ptr = &mut diagnostics as *mut Vec<String> as *mut c_void;

        let schema_ptr = unsafe {
            let parser_ctxt =
                xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::ParserContextCreationFailed);
            }

            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(collect_schema_diagnostic),
                diagnostics_ptr,
            );

            // Parse errors in imported schema documents bypass the schema
            // parser context on some libxml2 versions.
            let guard =
                StructuredErrorGuard::install(diagnostics_ptr, Some(collect_schema_diagnostic));
            let schema_ptr = xmlSchemaParse(parser_ctxt);
            drop(guard);

            xmlSchemaFreeParserCtxt(parser_ctxt);
            schema_ptr
        };

        if schema_ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed { diagnostics });
        }

        for diagnostic in &diagnostics {
            tracing::debug!(%diagnostic, "schema compilation diagnostic");
        }

        unsafe { XmlSchemaPtr::from_raw(schema_ptr) }
    }

    /// Validate an in-memory document against a compiled schema, streaming it
    /// through a namespace-aware SAX parser.
    ///
    /// Every warning, error and fatal error is appended to `collector` in
    /// arrival order. Parsing stops at the first fatal well-formedness error.
    ///
    /// Thread-safe: each call creates its own validation context.
    ///
    /// # Errors
    ///
    /// - Parser configuration failures (`ValidationContextCreationFailed`,
    ///   `InputBufferCreationFailed`, `DocumentTooLarge`) before any byte is read
    /// - `InternalError` when libxml2 returns a negative code without having
    ///   reported a fatal error
    /// - `SilentFailure` when libxml2 rejects the document without reporting why
    pub fn validate_memory(
        &self,
        schema: &XmlSchemaPtr,
        document: &[u8],
        collector: &mut ErrorCollector,
    ) -> LibXml2Result<EngineStatus> {
        let size = c_int::try_from(document.len()).map_err(|_| LibXml2Error::DocumentTooLarge {
            size: document.len(),
        })?;
        let events_before = collector.len();
        let mut sink = ErrorSink {
            collector,
            fatal_reported: false,
        };
        let sink_ptr = &mut sink as *mut ErrorSink<'_> as *mut c_void;

        let result_code = unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let input = xmlParserInputBufferCreateMem(
                document.as_ptr() as *const c_char,
                size,
                XML_CHAR_ENCODING_NONE,
            );
            if input.is_null() {
                xmlSchemaFreeValidCtxt(valid_ctxt);
                return Err(LibXml2Error::InputBufferCreationFailed {
                    size: document.len(),
                });
            }

            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(collect_structured_error),
                sink_ptr,
            );

            // Ownership of `input` passes to libxml2.
            let guard = StructuredErrorGuard::install(sink_ptr, Some(collect_structured_error));
            let code = xmlSchemaValidateStream(
                valid_ctxt,
                input,
                XML_CHAR_ENCODING_NONE,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            );
            drop(guard);

            xmlSchemaFreeValidCtxt(valid_ctxt);
            code
        };

        let status = EngineStatus::from_code(result_code, sink.fatal_reported)?;
        if let EngineStatus::Invalid { code } = status
            && sink.collector.len() == events_before
        {
            return Err(LibXml2Error::SilentFailure { code });
        }

        Ok(status)
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
