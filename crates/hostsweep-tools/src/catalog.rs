//! Built-in tool definitions.

use hostsweep_core::{InstallMethod, ToolInfo};

/// Every tool hostsweep knows how to drive, keyed by `ToolInfo::name`
#[must_use]
pub fn default_tools() -> Vec<ToolInfo> {
    vec![
        ToolInfo::new("hollows_hunter", "HollowsHunter", "hollows_hunter.exe")
            .release("hasherezade/hollows_hunter", "hollows_hunter64.zip")
            .elevated(true)
            .license("BSD-2-Clause"),
        ToolInfo::new("pe_sieve", "PE-sieve", "pe-sieve64.exe")
            .release("hasherezade/pe-sieve", "pe-sieve64.exe")
            .elevated(true)
            .license("BSD-2-Clause"),
        ToolInfo::new("yara_x", "YARA-X", "yr.exe")
            .release(
                "VirusTotal/yara-x",
                "yara-x-v*-x86_64-pc-windows-msvc.zip",
            )
            .license("BSD-3-Clause"),
        ToolInfo::new("clamav", "ClamAV", "clamscan.exe")
            .install_method(InstallMethod::PackagedInstaller)
            .license("GPL-2.0"),
        ToolInfo::new("freshclam", "FreshClam", "freshclam.exe")
            .install_method(InstallMethod::PackagedInstaller)
            .license("GPL-2.0"),
        ToolInfo::new("hayabusa", "Hayabusa", "hayabusa.exe")
            .release("Yamato-Security/hayabusa", "hayabusa-*-win-x64.zip")
            .license("AGPL-3.0"),
        ToolInfo::new("chainsaw", "Chainsaw", "chainsaw.exe")
            .release(
                "WithSecureLabs/chainsaw",
                "chainsaw_x86_64-pc-windows-msvc.zip",
            )
            .license("GPL-3.0"),
        ToolInfo::new("sysmon", "Sysmon", "Sysmon64.exe")
            .install_method(InstallMethod::Manual)
            .elevated(true)
            .license("Proprietary (Microsoft)"),
        ToolInfo::new("autorunsc", "Autoruns CLI", "autorunsc64.exe")
            .install_method(InstallMethod::Manual)
            .elevated(true)
            .license("Proprietary (Microsoft)"),
        ToolInfo::new("sigcheck", "Sigcheck", "sigcheck64.exe")
            .install_method(InstallMethod::Manual)
            .license("Proprietary (Microsoft)"),
        ToolInfo::new("listdlls", "ListDLLs", "listdlls64.exe")
            .install_method(InstallMethod::Manual)
            .elevated(true)
            .license("Proprietary (Microsoft)"),
    ]
}
