//! Shared email content templates
//!
//! Canonical content generators for verification emails, used by both
//! production (SES) and mock email services.

/// Subject line of every verification email
pub const VERIFICATION_SUBJECT: &str = "Hey from ProgSoc! Verify your email for our Discord server!";

/// Generate plain-text body for a verification email.
pub fn verification_text(callback_url: &str, expires_in_hours: u64) -> String {
    format!(
        "Hi there!\n\n\
        Someone (hopefully you) asked to link this email address to a Discord account \
        in the ProgSoc server.\n\n\
        Open the link below while signed in to confirm it:\n\
        {}\n\n\
        This link can be used once and expires in {} hours.\n\n\
        If you didn't ask for this, you can ignore this email.\n\n\
        Cheers,\n\
        ProgSoc",
        callback_url, expires_in_hours
    )
}

/// Generate styled HTML body for a verification email.
pub fn verification_html(callback_url: &str, expires_in_hours: u64) -> String {
    format!(
        r#"
            <html>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <h2 style="color: #5865f2;">Verify your email</h2>

                    <p>Hi there!</p>

                    <p>Someone (hopefully you) asked to link this email address to a Discord account in the <strong>ProgSoc</strong> server.</p>

                    <div style="text-align: center; margin: 30px 0;">
                        <a href="{callback_url}"
                           style="background-color: #5865f2; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block; font-weight: bold;">
                            Verify Email
                        </a>
                    </div>

                    <p>Or copy and paste this link in your browser:</p>
                    <p style="background-color: #f5f5f5; padding: 10px; border-radius: 4px; word-break: break-all;">
                        <a href="{callback_url}">{callback_url}</a>
                    </p>

                    <p style="color: #666; font-size: 14px;">
                        <em>This link can be used once and expires in {expires_in_hours} hours.</em>
                    </p>

                    <hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">

                    <p style="color: #666; font-size: 12px;">
                        If you didn't ask for this, you can ignore this email.<br>
                        Cheers, ProgSoc
                    </p>
                </div>
            </body>
            </html>
            "#,
        callback_url = callback_url,
        expires_in_hours = expires_in_hours
    )
}
