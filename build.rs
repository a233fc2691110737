//! Build script for diskprint
//!
//! On Windows, embeds `diskprint.manifest` so the binary is long-path aware.
//! Backup disks routinely hold paths beyond the 260 character `MAX_PATH`
//! limit; with the manifest (and the Windows 10 v1607+ registry setting)
//! paths up to 32,767 characters can be walked and hashed.
//!
//! On other platforms the script does nothing.

fn main() {
    #[cfg(windows)]
    {
        // The .rc file embeds the manifest as an RT_MANIFEST resource.
        embed_resource::compile("diskprint.rc", embed_resource::NONE);

        println!("cargo:rerun-if-changed=diskprint.rc");
        println!("cargo:rerun-if-changed=diskprint.manifest");
    }
}
