//! Shared constants for end-to-end tests
//!
//! When the fixture site changes (modules, functions, versions),
//! update only this file.

// ============================================================================
// Server
// ============================================================================

/// Key accepted by the `/v1/internal` routes of the test server
pub const ADMIN_KEY: &str = "test-admin-key";

/// Maximum time to wait for the test server to answer `GET /`
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Delay between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Per request timeout of the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Embedding service address nothing listens on
pub const UNREACHABLE_EMBEDDING_URL: &str = "http://127.0.0.1:9";

// ============================================================================
// Fixture Modules
// ============================================================================

/// Kernel module, under `bitrix/modules`
pub const MAIN_MODULE_ID: &str = "main";
pub const MAIN_MODULE_VERSION: &str = "24.100.0";

/// Partner module, under `local/modules`
pub const DEMO_MODULE_ID: &str = "vendor.demo";
pub const DEMO_MODULE_VERSION: &str = "1.0.0";

pub const MODULES_COUNT: usize = 2;

// ============================================================================
// Fixture Symbols
// ============================================================================

/// Method with two typed arguments, one of them with a default value
pub const DEMO_METHOD: &str = "NS\\Klass::method";
pub const DEMO_FILE: &str = "/local/modules/vendor.demo/lib/klass.php";
pub const DEMO_METHOD_LINE: usize = 9;

/// The method exactly as written in the fixture file, doc comment included
pub const DEMO_METHOD_SOURCE: &str = "/**
     * Joins two values.
     */
    public function method(int $a, string $b = 'x')
    {
        return $a . $b;
    }";

pub const LOADER_INCLUDE: &str = "Bitrix\\Main\\Loader::includeModule";
pub const LOADER_REGISTER: &str = "Bitrix\\Main\\Loader::registerAutoLoadClasses";
pub const LOADER_EVENT: &str = "OnBeforeAutoload";
