use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address receiver, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address sender, address receiver, uint256 amount) external returns (bool);

        event Transfer(address indexed sender, address indexed receiver, uint256 amount);
        event Approval(address indexed owner, address indexed spender, uint256 amount);
    }
}
