//! Sign-in: reconcile the local cart with the user's saved cart.

use std::io::Write;

use cartsync_client::ReconcileOutcome;
use cartsync_core::UserId;

use crate::context::Context;
use crate::error::CliError;
use crate::output::render_cart;

/// Sign in as `user_id` and reconcile carts.
///
/// A saved cart on the server replaces the local one. Otherwise the local
/// cart is uploaded.
///
/// # Errors
///
/// Returns error if writing the output fails.
pub async fn login(ctx: &Context, out: &mut impl Write, user_id: UserId) -> Result<(), CliError> {
    ctx.session.sign_in(user_id.clone());

    match ctx.store.sync_and_merge_cart(&user_id).await {
        ReconcileOutcome::AdoptedRemote { items } => {
            writeln!(out, "Signed in as {user_id}. Restored {items} saved line(s).")?;
        }
        ReconcileOutcome::UploadedLocal { items, success } => {
            writeln!(out, "Signed in as {user_id}. Saved {items} line(s) to your account.")?;
            if !success {
                writeln!(out, "Warning: the cart could not be saved to the server.")?;
            }
        }
        ReconcileOutcome::NothingToSync => writeln!(out, "Signed in as {user_id}.")?,
        ReconcileOutcome::RemoteUnavailable => {
            writeln!(
                out,
                "Signed in as {user_id}. The server is unavailable, keeping the local cart."
            )?;
        }
        ReconcileOutcome::Disabled => {
            writeln!(out, "Signed in as {user_id}. No backend configured, cart stays local.")?;
        }
    }

    render_cart(out, &ctx.store.snapshot(), ctx.currency)
}
