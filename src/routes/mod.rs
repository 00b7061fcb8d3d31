/// Router Module Index
///
/// Splits the API by access level. Authentication is applied once, as a
/// route layer over the merged authenticated and admin routers; the admin
/// role itself is checked by the `AdminUser` extractor in each admin handler.

/// Routes reachable without a token.
pub mod public;

/// Routes for any authenticated identity.
pub mod authenticated;

/// Routes restricted to the `admin` role.
pub mod admin;
